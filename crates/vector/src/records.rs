//! Course dataset loading and cleaning

use csv::StringRecord;
use sha2::{Digest, Sha256};
use skillmatch_common::{Result, SkillMatchError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Item, Price};

/// Columns every dataset must carry; any others are ignored
pub const REQUIRED_COLUMNS: [&str; 5] = ["Title", "Offered_by", "Domain", "Duration", "Price"];

/// Load the dataset at `path` and clean every row into an [`Item`]
pub fn load_and_clean(path: &Path, require_title: bool) -> Result<Vec<Item>> {
    DatasetFile::read(path)?.items(require_title)
}

/// SHA-256 hex digest of the dataset file
pub fn dataset_fingerprint(path: &Path) -> Result<String> {
    Ok(DatasetFile::read(path)?.fingerprint)
}

/// Dataset file contents, read once
#[derive(Debug, Clone)]
pub struct DatasetFile {
    path: PathBuf,
    bytes: Vec<u8>,
    fingerprint: String,
}

impl DatasetFile {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SkillMatchError::data(format!("Failed to read dataset {}: {}", path.display(), e))
        })?;
        let fingerprint = fingerprint_bytes(&bytes);
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            fingerprint,
        })
    }

    /// SHA-256 hex digest of the file contents
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Clean every row into an [`Item`]
    pub fn items(&self, require_title: bool) -> Result<Vec<Item>> {
        let items = read_items(self.bytes.as_slice(), require_title)?;
        info!("Loaded {} courses from {}", items.len(), self.path.display());
        Ok(items)
    }
}

/// SHA-256 hex digest of raw dataset bytes
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parse CSV from any reader; row order becomes item ids
pub fn read_items<R: Read>(reader: R, require_title: bool) -> Result<Vec<Item>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| SkillMatchError::data(format!("Failed to read dataset header: {}", e)))?
        .clone();
    let columns = Columns::locate(&headers)?;

    let mut items = Vec::new();
    for result in reader.records() {
        let record = result
            .map_err(|e| SkillMatchError::data(format!("Malformed dataset row: {}", e)))?;
        let id = items.len();
        let item = columns.item(id, &record);

        if require_title && item.title.is_empty() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(SkillMatchError::data(format!(
                "Row at line {} has an empty Title",
                line
            )));
        }
        if item.price == Price::Unknown {
            debug!("Course {} has no usable price", id);
        }
        items.push(item);
    }

    if items.is_empty() {
        return Err(SkillMatchError::data("Dataset contains no courses"));
    }

    Ok(items)
}

/// Normalize a formatted price ("₹ 1,500/-", "Rs. 499") to a number
///
/// Anything that is not a finite, non-negative number after stripping
/// formatting becomes [`Price::Unknown`].
pub fn clean_price(raw: &str) -> Price {
    let mut text = raw.trim().to_lowercase();
    if let Some(stripped) = text.strip_suffix("/-") {
        text = stripped.to_string();
    }
    for word in ["inr", "rs.", "rs"] {
        text = text.replace(word, "");
    }
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | '€' | '£') && !c.is_whitespace())
        .collect();

    if text.is_empty() {
        return Price::Unknown;
    }
    Price::from(text.parse::<f64>().ok())
}

/// Positions of the required columns in the header row
struct Columns {
    title: usize,
    offered_by: usize,
    domain: usize,
    duration: usize,
    price: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SkillMatchError::data(format!(
                "Dataset is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let position = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            title: position("Title"),
            offered_by: position("Offered_by"),
            domain: position("Domain"),
            duration: position("Duration"),
            price: position("Price"),
        })
    }

    fn item(&self, id: usize, record: &StringRecord) -> Item {
        let field = |index: usize| record.get(index).unwrap_or_default().to_string();
        Item {
            id,
            title: field(self.title),
            offered_by: field(self.offered_by),
            domain: field(self.domain),
            duration: field(self.duration),
            price: clean_price(record.get(self.price).unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Title,Offered_by,Domain,Duration,Price";

    #[test]
    fn test_clean_price() {
        assert_eq!(clean_price("1,500/-"), Price::Amount(1500.0));
        assert_eq!(clean_price("₹ 2,999"), Price::Amount(2999.0));
        assert_eq!(clean_price("Rs. 499"), Price::Amount(499.0));
        assert_eq!(clean_price("INR 12000"), Price::Amount(12000.0));
        assert_eq!(clean_price("0"), Price::Amount(0.0));
        assert_eq!(clean_price("749.50"), Price::Amount(749.5));
    }

    #[test]
    fn test_clean_price_unknown() {
        assert_eq!(clean_price(""), Price::Unknown);
        assert_eq!(clean_price("Free"), Price::Unknown);
        assert_eq!(clean_price("-500"), Price::Unknown);
        assert_eq!(clean_price("NaN"), Price::Unknown);
        assert_eq!(clean_price("1.2.3"), Price::Unknown);
    }

    #[test]
    fn test_read_items() {
        let data = format!(
            "{HEADER}\n\
             Intro to Python,NASSCOM,Programming,40 Hours,\"1,500/-\"\n\
             Advanced Welding Techniques,SkillTech,,2 Weeks,call us\n"
        );
        let items = read_items(data.as_bytes(), false).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 0);
        assert_eq!(items[0].price, Price::Amount(1500.0));
        assert_eq!(items[1].id, 1);
        assert_eq!(items[1].domain, "");
        assert_eq!(items[1].price, Price::Unknown);
    }

    #[test]
    fn test_extra_columns_and_order_tolerated() {
        let data = "Price,Id,Duration,Title,Rating,Domain,Offered_by\n\
                    999,17,6 Weeks,Cloud Basics,4.5,Cloud,AWS\n";
        let items = read_items(data.as_bytes(), false).unwrap();

        assert_eq!(items[0].title, "Cloud Basics");
        assert_eq!(items[0].offered_by, "AWS");
        assert_eq!(items[0].domain, "Cloud");
        assert_eq!(items[0].duration, "6 Weeks");
        assert_eq!(items[0].price, Price::Amount(999.0));
    }

    #[test]
    fn test_missing_columns_is_data_error() {
        let data = "Title,Domain,Price\nIntro to Python,Programming,100\n";
        let err = read_items(data.as_bytes(), false).unwrap_err();

        assert!(matches!(err, SkillMatchError::Data(_)));
        assert!(err.to_string().contains("Offered_by"));
        assert!(err.to_string().contains("Duration"));
    }

    #[test]
    fn test_ragged_row_is_data_error() {
        let data = format!("{HEADER}\nIntro to Python,NASSCOM\n");
        let err = read_items(data.as_bytes(), false).unwrap_err();
        assert!(matches!(err, SkillMatchError::Data(_)));
    }

    #[test]
    fn test_empty_dataset_is_data_error() {
        let err = read_items(format!("{HEADER}\n").as_bytes(), false).unwrap_err();
        assert!(matches!(err, SkillMatchError::Data(_)));

        let err = read_items("".as_bytes(), false).unwrap_err();
        assert!(matches!(err, SkillMatchError::Data(_)));
    }

    #[test]
    fn test_empty_title() {
        let data = format!("{HEADER}\n,NASSCOM,Programming,40 Hours,100\n");

        let items = read_items(data.as_bytes(), false).unwrap();
        assert_eq!(items[0].title, "");

        let err = read_items(data.as_bytes(), true).unwrap_err();
        assert!(matches!(err, SkillMatchError::Data(_)));
    }

    #[test]
    fn test_load_and_fingerprint_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").expect("write header");
        writeln!(file, "Data Science,IBM,Analytics,3 Months,4999").expect("write row");

        let items = load_and_clean(file.path(), false).expect("load dataset");
        assert_eq!(items.len(), 1);

        let first = dataset_fingerprint(file.path()).unwrap();
        assert_eq!(first.len(), 64);
        writeln!(file, "Leadership,NASSCOM,Soft Skills,1 Week,0").expect("write row");
        file.flush().unwrap();
        assert_ne!(first, dataset_fingerprint(file.path()).unwrap());
    }

    #[test]
    fn test_dataset_file_reads_once() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").expect("write header");
        writeln!(file, "Data Science,IBM,Analytics,3 Months,4999").expect("write row");
        file.flush().unwrap();

        let dataset = DatasetFile::read(file.path()).unwrap();
        assert_eq!(dataset.fingerprint(), dataset_fingerprint(file.path()).unwrap());

        // items come from the bytes already read
        std::fs::remove_file(file.path()).unwrap();
        let items = dataset.items(false).unwrap();
        assert_eq!(items[0].title, "Data Science");
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = load_and_clean(Path::new("/nonexistent/courses.csv"), false).unwrap_err();
        assert!(matches!(err, SkillMatchError::Data(_)));
    }
}
