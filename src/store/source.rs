//! Tabular source of the candle series

use itertools::Itertools;
use std::path::Path;

use super::schema::column;
use crate::{
    error::Error,
    technical_analysis::{Candle, CandleRecord},
};

const SOURCE_COLUMNS: [&str; 6] = [
    column::TIMESTAMP,
    column::OPEN,
    column::HIGH,
    column::LOW,
    column::CLOSE,
    column::VOLUME,
];

/// Read every row of the csv source and sort it by timestamp.
///
/// A single row that cannot be parsed aborts the whole read.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>, Error> {
    let path = path.as_ref();
    log::info!("Read candle source {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|error| Error::Ingestion(format!("{}: {}", path.display(), error)))?;

    // column names are matched case insensitively
    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|error| Error::Ingestion(format!("header: {}", error)))?
        .iter()
        .map(|name| name.to_lowercase())
        .collect();

    if let Some(missing) = SOURCE_COLUMNS
        .iter()
        .find(|name| !headers.iter().any(|header| header == **name))
    {
        return Err(Error::Ingestion(format!(
            "header: missing column {:?} in {:?}",
            missing,
            headers.iter().collect::<Vec<_>>()
        )));
    }
    reader.set_headers(headers);

    let mut candles = reader
        .deserialize::<CandleRecord>()
        .enumerate()
        .map(|(index, result)| {
            result.map(Candle::from).map_err(|error| {
                // first data row is line 2, after the header
                Error::Ingestion(format!("row {}: {}", index + 2, error))
            })
        })
        .collect::<Result<Vec<Candle>, Error>>()?;

    if candles.is_empty() {
        return Err(Error::Ingestion(format!(
            "{} does not contain any candle",
            path.display()
        )));
    }

    candles.sort_by_key(|candle| candle.timestamp());

    if let Some((duplicate, _)) = candles
        .iter()
        .tuple_windows()
        .find(|(previous, next)| previous.timestamp() == next.timestamp())
    {
        return Err(Error::Ingestion(format!(
            "duplicated timestamp {}",
            duplicate.timestamp()
        )));
    }

    log::info!("Read {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use yata::core::OHLCV;

    fn source(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[rstest]
    fn test_read_sorted_source() {
        let file = source(
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:02:00,12,11,9,10,3\n\
             2024-01-01 00:00:00,10,12,9,11,1\n\
             2024-01-01 00:01:00,11,13,10,12,2\n",
        );
        let candles = read_source(file.path()).unwrap();

        assert_eq!(candles.len(), 3);
        let closes: Vec<f64> = candles.iter().map(|c| c.close()).collect();
        assert_eq!(closes, vec![11.0, 12.0, 10.0]);
    }

    #[rstest]
    #[case::lowercase("timestamp,open,high,low,close,volume")]
    #[case::capitalized("Timestamp,Open,High,Low,Close,Volume")]
    #[case::mixed("TimeStamp,oPen,HIGH,Low,cLoSe,VolumE")]
    #[case::padded(" timestamp , open,high ,low,close, volume ")]
    #[case::reordered("Volume,Close,Low,High,Open,Timestamp")]
    fn test_header_case_insensitive(#[case] header: &str) {
        let row = if header.starts_with("Volume") {
            "1500,11,9,12,10,2024-01-01 00:00:00"
        } else {
            "2024-01-01 00:00:00,10,12,9,11,1500"
        };
        let file = source(&format!("{}\n{}\n", header, row));
        let candles = read_source(file.path()).unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open(), 10.0);
        assert_eq!(candles[0].close(), 11.0);
        assert_eq!(candles[0].volume(), 1500.0);
    }

    #[rstest]
    fn test_malformed_relations_pass_through() {
        let file = source(
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:00:00,12,11,13,10,0\n",
        );
        let candles = read_source(file.path()).unwrap();
        assert_eq!(candles[0].high(), 11.0);
        assert_eq!(candles[0].low(), 13.0);
    }

    #[rstest]
    #[case::bad_number(
        "timestamp,open,high,low,close,volume\n2024-01-01 00:00:00,10,12,9,11,1\n2024-01-01 00:01:00,x,12,9,11,1\n",
        "row 3"
    )]
    #[case::bad_timestamp(
        "timestamp,open,high,low,close,volume\nnoon,10,12,9,11,1\n",
        "row 2"
    )]
    #[case::duplicate(
        "timestamp,open,high,low,close,volume\n2024-01-01 00:00:00,10,12,9,11,1\n2024-01-01 00:00:00,10,12,9,11,1\n",
        "duplicated"
    )]
    #[case::empty("timestamp,open,high,low,close,volume\n", "does not contain")]
    #[case::missing_column(
        "timestamp,open,high,low,close\n2024-01-01 00:00:00,10,12,9,11\n",
        "header: missing column \"volume\""
    )]
    fn test_invalid_source(#[case] content: &str, #[case] message: &str) {
        let file = source(content);
        match read_source(file.path()) {
            Err(Error::Ingestion(found)) => assert!(found.contains(message), "{}", found),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[rstest]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_source(dir.path().join("missing.csv")),
            Err(Error::Ingestion(_))
        ));
    }
}
