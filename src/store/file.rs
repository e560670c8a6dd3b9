//! Arrow IPC file holding the durable candle series

use arrow::{
    compute::concat_batches,
    datatypes::Schema,
    ipc::{reader::FileReader, writer::FileWriter},
    record_batch::RecordBatch,
};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};
use uuid::Uuid;

use super::{
    schema::{build_candle_batch, CANDLE_SCHEMA},
    series::Series,
};
use crate::{error::Error, technical_analysis::Candle};

/// Result of an attempt to publish a freshly written store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Publication {
    Published,
    /// Another writer published the store first
    AlreadyExists,
}

/// Read the whole store file into memory
pub fn read_store<P: AsRef<Path>>(path: P) -> Result<Series, Error> {
    let path = path.as_ref();
    let unavailable = |error: &dyn std::fmt::Display| {
        Error::StoreUnavailable(format!("{}: {}", path.display(), error))
    };

    let file = File::open(path).map_err(|error| unavailable(&error))?;
    let reader = FileReader::try_new(BufReader::new(file), None).map_err(|error| unavailable(&error))?;
    let schema = reader.schema();

    let batches = reader
        .collect::<Result<Vec<RecordBatch>, _>>()
        .map_err(|error| unavailable(&error))?;
    log::debug!("Read {} record batches from {}", batches.len(), path.display());

    let batch = concat_batches(&schema, &batches).map_err(|error| unavailable(&error))?;
    Series::try_from(batch)
}

fn temporary_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

fn write_batches(candles: &[Candle], path: &Path, batch_size: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut buffer = BufWriter::new(file);
    let schema: &Schema = &CANDLE_SCHEMA;

    {
        let mut writer = FileWriter::try_new(&mut buffer, schema)?;
        for chunk in candles.chunks(batch_size.max(1)) {
            writer.write(&build_candle_batch(chunk)?)?;
        }
        writer.finish()?;
    }

    buffer.flush()?;
    buffer.get_ref().sync_all()?;
    Ok(())
}

/// Write the candles next to `path` then publish the file under `path`.
///
/// The final name only ever points to a complete file. When another writer
/// published first, the local copy is discarded.
pub fn write_store<P: AsRef<Path>>(
    candles: &[Candle],
    path: P,
    batch_size: usize,
) -> Result<Publication, Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temporary = temporary_path(path);
    log::debug!("Write {} candles to {}", candles.len(), temporary.display());

    let publication = write_batches(candles, &temporary, batch_size).and_then(|_| {
        match fs::hard_link(&temporary, path) {
            Ok(()) => Ok(Publication::Published),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                Ok(Publication::AlreadyExists)
            }
            Err(error) => {
                log::warn!("Hard link failed ({}), rename store instead", error);
                if path.exists() {
                    Ok(Publication::AlreadyExists)
                } else {
                    fs::rename(&temporary, path)?;
                    Ok(Publication::Published)
                }
            }
        }
    });

    if temporary.exists() {
        if let Err(error) = fs::remove_file(&temporary) {
            log::warn!("Failed to remove {}: {}", temporary.display(), error);
        }
    }

    publication
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};
    use rstest::*;

    fn candles(len: usize) -> Vec<Candle> {
        let start: NaiveDateTime = "2023-06-01T00:00:00".parse().unwrap();
        (0..len)
            .map(|i| {
                let price = 50.0 + i as f64;
                Candle::new(
                    start + Duration::hours(i as i64),
                    price,
                    price + 1.0,
                    price - 1.0,
                    price,
                    1.0,
                )
            })
            .collect()
    }

    #[rstest]
    #[case::single_batch(10, 64)]
    #[case::many_batches(100, 7)]
    fn test_write_then_read(#[case] len: usize, #[case] batch_size: usize) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("candles.arrow");
        let candles = candles(len);

        let publication = write_store(&candles, &path, batch_size).unwrap();
        assert_eq!(publication, Publication::Published);

        let series = read_store(&path).unwrap();
        assert_eq!(series.scan(None), candles);

        // only the published file is left behind
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[rstest]
    fn test_second_writer_keeps_first_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candles.arrow");

        write_store(&candles(3), &path, 10).unwrap();
        let publication = write_store(&candles(5), &path, 10).unwrap();

        assert_eq!(publication, Publication::AlreadyExists);
        assert_eq!(read_store(&path).unwrap().len(), 3);
    }

    #[rstest]
    fn test_read_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_store(dir.path().join("missing.arrow")),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[rstest]
    fn test_read_corrupted_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candles.arrow");
        fs::write(&path, b"definitely not arrow").unwrap();

        assert!(matches!(
            read_store(&path),
            Err(Error::StoreUnavailable(_))
        ));
    }
}
