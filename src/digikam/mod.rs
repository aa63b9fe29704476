//! digiKam collection writer.
//!
//! Owns the output directory and its `digikam4.db` catalog. Each call opens its
//! own connection, so no state is shared between images.

pub mod hashing;
pub mod naming;
mod schema;

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::piwigo::RemoteImage;
use crate::transfer::LocalCollection;

pub use schema::{SCHEMA, TABLES};

/// `Images.status`: visible
const STATUS_VISIBLE: i64 = 1;
/// `Images.category`: still image
const CATEGORY_IMAGE: i64 = 1;
/// `ImageComments.type`: comment
const COMMENT_TYPE: i64 = 1;
/// `AlbumRoots.type`: volume-hard-wired
const ROOT_TYPE: i64 = 1;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct DigikamExporter {
    output_dir: PathBuf,
    db_path: PathBuf,
    root_label: String,
}

impl DigikamExporter {
    /// Exporter writing into `output_dir` with the default catalog name.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_config(&CollectionConfig {
            output_dir: output_dir.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        let output_dir = config.output_dir.clone();
        std::fs::create_dir_all(&output_dir).map_err(|e| Error::filesystem(&output_dir, e))?;

        Ok(Self {
            db_path: output_dir.join(&config.database_name),
            output_dir,
            root_label: config.root_label.clone(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Create the catalog tables and the album root row if they are missing.
    /// Existing rows are left alone.
    pub fn initialize_database(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(SCHEMA)?;

        let roots: i64 = conn.query_row("SELECT COUNT(*) FROM AlbumRoots", [], |row| row.get(0))?;
        if roots == 0 {
            let identifier = format!("volumeid:?path={}", self.root_identifier_path());
            conn.execute(
                r#"
                INSERT INTO AlbumRoots (label, status, type, identifier, specificPath)
                VALUES (?, 0, ?, ?, '/')
                "#,
                params![self.root_label, ROOT_TYPE, identifier],
            )?;
            info!("Created album root '{}' in {:?}", self.root_label, self.db_path);
        }

        info!("Catalog ready at {:?}", self.db_path);
        Ok(())
    }

    fn root_identifier_path(&self) -> String {
        let dir = self
            .output_dir
            .canonicalize()
            .unwrap_or_else(|_| self.output_dir.clone());
        dir.to_string_lossy().replace('\\', "/")
    }

    /// Write one image into the album for `category_path` and record it in the
    /// catalog. Returns the path of the written file.
    ///
    /// The catalog rows for the image commit together or not at all. A file
    /// that was written before a failed catalog insert stays on disk.
    pub fn save_image(
        &self,
        image: &RemoteImage,
        data: &[u8],
        category_path: &str,
    ) -> Result<PathBuf> {
        self.save_image_inner(image, data, category_path)
            .map_err(|e| Error::SaveImage {
                id: image.id,
                source: Box::new(e),
            })
    }

    fn save_image_inner(
        &self,
        image: &RemoteImage,
        data: &[u8],
        category_path: &str,
    ) -> Result<PathBuf> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("image data is empty".to_string()));
        }

        let relative_path = naming::album_relative_path(category_path);
        let target_dir = self.output_dir.join(&relative_path);
        std::fs::create_dir_all(&target_dir).map_err(|e| Error::filesystem(&target_dir, e))?;

        let file_name = naming::image_file_name(&image.file, image.id);
        let file_path = naming::write_unique(&target_dir, &file_name, data)?;
        let final_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(file_name);

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let image_id = insert_image(&tx, image, &final_name, &relative_path, data)?;
        tx.commit()?;

        debug!(
            "Saved image {} as {:?} (catalog id {})",
            image.id, file_path, image_id
        );
        Ok(file_path)
    }
}

impl LocalCollection for DigikamExporter {
    fn initialize(&mut self) -> Result<()> {
        self.initialize_database()
    }

    fn save_image(
        &mut self,
        image: &RemoteImage,
        data: &[u8],
        category_path: &str,
    ) -> Result<PathBuf> {
        DigikamExporter::save_image(self, image, data, category_path)
    }
}

fn format_date(dt: NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn insert_image(
    tx: &Transaction,
    image: &RemoteImage,
    file_name: &str,
    relative_path: &str,
    data: &[u8],
) -> Result<i64> {
    let album_id = get_or_create_album(tx, relative_path)?;

    tx.execute(
        r#"
        INSERT INTO Images (album, name, status, category, modificationDate, fileSize, uniqueHash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            album_id,
            file_name,
            STATUS_VISIBLE,
            CATEGORY_IMAGE,
            format_date(now()),
            data.len() as i64,
            hashing::unique_hash(data),
        ],
    )?;
    let image_id = tx.last_insert_rowid();

    let (width, height) = if image.width == 0 || image.height == 0 {
        hashing::probe_dimensions(data).unwrap_or((image.width, image.height))
    } else {
        (image.width, image.height)
    };
    let creation_date = image.date_creation.unwrap_or_else(now);

    tx.execute(
        r#"
        INSERT INTO ImageInformation (imageid, creationDate, width, height, format)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            image_id,
            format_date(creation_date),
            width,
            height,
            naming::format_from_name(file_name),
        ],
    )?;

    for tag in image.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let tag_id = get_or_create_tag(tx, tag)?;
        tx.execute(
            "INSERT OR IGNORE INTO ImageTags (imageid, tagid) VALUES (?, ?)",
            params![image_id, tag_id],
        )?;
    }

    if !image.comment.trim().is_empty() {
        tx.execute(
            r#"
            INSERT INTO ImageComments (imageid, type, language, date, comment)
            VALUES (?, ?, 'x-default', ?, ?)
            "#,
            params![image_id, COMMENT_TYPE, format_date(now()), image.comment],
        )?;
    }

    Ok(image_id)
}

fn get_or_create_album(tx: &Transaction, relative_path: &str) -> Result<i64> {
    let catalog_path = naming::album_catalog_path(relative_path);
    let root_id: i64 = tx.query_row("SELECT MIN(id) FROM AlbumRoots", [], |row| row.get(0))?;

    let existing = tx
        .query_row(
            "SELECT id FROM Albums WHERE albumRoot = ? AND relativePath = ?",
            params![root_id, catalog_path],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO Albums (albumRoot, relativePath, date) VALUES (?, ?, ?)",
        params![root_id, catalog_path, Local::now().date_naive().to_string()],
    )?;
    debug!("Created album {}", catalog_path);
    Ok(tx.last_insert_rowid())
}

fn get_or_create_tag(tx: &Transaction, name: &str) -> Result<i64> {
    let existing = tx
        .query_row(
            "SELECT id FROM Tags WHERE name = ? AND pid = 0",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute("INSERT INTO Tags (pid, name) VALUES (0, ?)", [name])?;
    Ok(tx.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exporter() -> (TempDir, DigikamExporter) {
        let dir = TempDir::new().unwrap();
        let exporter = DigikamExporter::new(dir.path().join("collection")).unwrap();
        exporter.initialize_database().unwrap();
        (dir, exporter)
    }

    fn sample_image(id: i64, file: &str) -> RemoteImage {
        RemoteImage {
            id,
            name: format!("Image {}", id),
            file: file.to_string(),
            element_url: format!("http://gallery/upload/{}", file),
            width: 640,
            height: 480,
            ..Default::default()
        }
    }

    fn count(exporter: &DigikamExporter, sql: &str) -> i64 {
        let conn = Connection::open(exporter.database_path()).unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_dir, exporter) = exporter();
        exporter.initialize_database().unwrap();
        exporter.initialize_database().unwrap();

        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM AlbumRoots"), 1);
        for table in TABLES {
            let n = count(
                &exporter,
                &format!(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{}'",
                    table
                ),
            );
            assert_eq!(n, 1, "table {}", table);
        }
    }

    #[test]
    fn test_initialize_keeps_existing_rows() {
        let (_dir, exporter) = exporter();
        exporter
            .save_image(&sample_image(1, "a.jpg"), b"data", "Vacation")
            .unwrap();

        exporter.initialize_database().unwrap();
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 1);
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Albums"), 1);
    }

    #[test]
    fn test_album_root_row() {
        let (_dir, exporter) = exporter();
        let conn = Connection::open(exporter.database_path()).unwrap();
        let (label, identifier, specific): (String, String, String) = conn
            .query_row(
                "SELECT label, identifier, specificPath FROM AlbumRoots",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(label, "Piwigo Import");
        assert!(identifier.starts_with("volumeid:?path="));
        assert!(identifier.ends_with("collection"));
        assert_eq!(specific, "/");
    }

    #[test]
    fn test_save_image_writes_file_and_rows() {
        let (_dir, exporter) = exporter();
        let mut image = sample_image(7, "sunset.jpg");
        image.comment = "Beach at dusk".to_string();
        image.tags = vec!["beach".to_string(), "sun".to_string()];
        image.date_creation = crate::piwigo::models::parse_piwigo_date("2021-07-14 19:45:00");

        let path = exporter
            .save_image(&image, b"jpeg bytes", "Holidays / Rome")
            .unwrap();

        assert_eq!(
            path,
            exporter.output_dir().join("Holidays").join("Rome").join("sunset.jpg")
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");

        let conn = Connection::open(exporter.database_path()).unwrap();
        let album: String = conn
            .query_row("SELECT relativePath FROM Albums", [], |row| row.get(0))
            .unwrap();
        assert_eq!(album, "/Holidays/Rome");

        let (name, size, hash): (String, i64, String) = conn
            .query_row("SELECT name, fileSize, uniqueHash FROM Images", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(name, "sunset.jpg");
        assert_eq!(size, 10);
        assert_eq!(hash, hashing::unique_hash(b"jpeg bytes"));

        let (width, height, format, created): (i64, i64, String, String) = conn
            .query_row(
                "SELECT width, height, format, creationDate FROM ImageInformation",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!((width, height), (640, 480));
        assert_eq!(format, "JPG");
        assert_eq!(created, "2021-07-14T19:45:00");

        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM ImageTags"), 2);
        let comment: String = conn
            .query_row("SELECT comment FROM ImageComments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(comment, "Beach at dusk");
    }

    #[test]
    fn test_save_image_with_long_multibyte_file_name() {
        let (_dir, exporter) = exporter();
        let file = format!("{}.jpg", "写".repeat(150));

        let first = exporter
            .save_image(&sample_image(77, &file), b"bytes", "Vacation")
            .unwrap();
        let second = exporter
            .save_image(&sample_image(78, &file), b"bytes", "Vacation")
            .unwrap();

        let first_name = first.file_name().unwrap().to_str().unwrap();
        let second_name = second.file_name().unwrap().to_str().unwrap();
        assert!(first_name.len() <= naming::MAX_FILE_NAME_BYTES);
        assert!(first_name.ends_with(".jpg"));
        assert!(second_name.ends_with("_1.jpg"));
        assert_eq!(std::fs::read(&second).unwrap(), b"bytes");
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 2);
    }

    #[test]
    fn test_save_image_with_long_multibyte_category() {
        let (_dir, exporter) = exporter();
        let category = format!("旅行 / {}", "景".repeat(120));

        let path = exporter
            .save_image(&sample_image(79, "a.jpg"), b"bytes", &category)
            .unwrap();

        assert!(path.exists());
        let album_dir = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert!(album_dir.len() <= naming::MAX_FILE_NAME_BYTES);

        let conn = Connection::open(exporter.database_path()).unwrap();
        let album: String = conn
            .query_row("SELECT relativePath FROM Albums", [], |row| row.get(0))
            .unwrap();
        assert_eq!(album, format!("/旅行/{}", album_dir));
    }

    #[test]
    fn test_save_image_rejects_empty_data() {
        let (_dir, exporter) = exporter();
        let result = exporter.save_image(&sample_image(3, "a.jpg"), &[], "Vacation");

        match result {
            Err(Error::SaveImage { id, source }) => {
                assert_eq!(id, 3);
                assert!(matches!(*source, Error::InvalidArgument(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 0);
    }

    #[test]
    fn test_same_name_in_same_album_gets_suffix() {
        let (_dir, exporter) = exporter();
        let first = exporter
            .save_image(&sample_image(1, "dup.jpg"), b"one", "Vacation")
            .unwrap();
        let second = exporter
            .save_image(&sample_image(2, "dup?.jpg"), b"two", "Vacation")
            .unwrap();
        let third = exporter
            .save_image(&sample_image(3, "dup_.jpg"), b"three", "Vacation")
            .unwrap();

        assert_eq!(first.file_name().unwrap(), "dup.jpg");
        assert_eq!(second.file_name().unwrap(), "dup_.jpg");
        assert_eq!(third.file_name().unwrap(), "dup__1.jpg");

        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Albums"), 1);
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 3);
        assert_eq!(
            count(&exporter, "SELECT COUNT(*) FROM Images WHERE name = 'dup__1.jpg'"),
            1
        );
    }

    #[test]
    fn test_uncategorized_and_default_name() {
        let (_dir, exporter) = exporter();
        let path = exporter
            .save_image(&sample_image(42, ""), b"bytes", "  ")
            .unwrap();

        assert_eq!(
            path,
            exporter.output_dir().join("Uncategorized").join("image_42.jpg")
        );
    }

    #[test]
    fn test_tags_are_shared_and_deduplicated() {
        let (_dir, exporter) = exporter();
        let mut a = sample_image(1, "a.jpg");
        a.tags = vec!["family".to_string(), "family".to_string(), "".to_string()];
        let mut b = sample_image(2, "b.jpg");
        b.tags = vec!["family".to_string(), "dog".to_string()];

        exporter.save_image(&a, b"a", "Home").unwrap();
        exporter.save_image(&b, b"b", "Home").unwrap();

        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Tags"), 2);
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM ImageTags"), 3);
    }

    #[test]
    fn test_duplicate_content_is_recorded() {
        let (_dir, exporter) = exporter();
        exporter
            .save_image(&sample_image(1, "a.jpg"), b"same", "One")
            .unwrap();
        exporter
            .save_image(&sample_image(2, "b.jpg"), b"same", "Two")
            .unwrap();

        assert_eq!(
            count(&exporter, "SELECT COUNT(DISTINCT uniqueHash) FROM Images"),
            1
        );
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 2);
    }

    #[test]
    fn test_zero_dimensions_are_probed() {
        let (_dir, exporter) = exporter();
        let mut png = Vec::new();
        image::RgbImage::new(8, 6)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let mut image = sample_image(5, "tiny.png");
        image.width = 0;
        image.height = 0;

        exporter.save_image(&image, &png, "Misc").unwrap();

        assert_eq!(
            count(&exporter, "SELECT width * 100 + height FROM ImageInformation"),
            806
        );
    }

    #[test]
    fn test_failed_transaction_keeps_file_and_rolls_back() {
        let (_dir, exporter) = exporter();
        {
            let conn = Connection::open(exporter.database_path()).unwrap();
            conn.execute_batch("DROP TABLE ImageComments").unwrap();
        }
        let mut image = sample_image(9, "orphan.jpg");
        image.comment = "will fail".to_string();

        let result = exporter.save_image(&image, b"bytes", "Vacation");

        match result {
            Err(Error::SaveImage { id, source }) => {
                assert_eq!(id, 9);
                assert!(matches!(*source, Error::Catalog(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(exporter.output_dir().join("Vacation/orphan.jpg").exists());
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Images"), 0);
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM Albums"), 0);
        assert_eq!(count(&exporter, "SELECT COUNT(*) FROM ImageInformation"), 0);
    }
}
