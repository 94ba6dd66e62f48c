//! The annotated record store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use birdseye_addr::{record_key, ContentDigest, SampledHasher};
use birdseye_exif::{
    detect_container, patch_jpeg, read_jpeg_metadata, read_metadata, read_tiff, write_tiff,
    Container, ImageMetadata,
};
use birdseye_serial::{Portable, Primitive};
use birdseye_types::{is_image_path, ImageFrame, SourceRecord};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::QueryCache;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::index::{IndexDocument, IndexRecord, StoredEntry};

/// Index document filename under the store root.
const INDEX_FILE: &str = "index.json";
/// Container folder under the store root.
const IMAGES_DIR: &str = "images";
/// Reserved folder; created for layout compatibility, never written.
const THUMBNAILS_DIR: &str = "thumbnails";
/// Marker in container filenames distinguishing annotated files from
/// anything else dropped into the image folder.
const CONTAINER_MARKER: &str = ".ann.";
/// Version key written into embedded payloads for future migrations.
const RECORD_VERSION_KEY: &str = "_record_version";
const RECORD_VERSION: i64 = 1;

/// A folder of self-contained annotated container files plus a rebuildable
/// index over them.
///
/// The container files are the durable record: each one embeds its full
/// record in the image metadata block. The index document only maps record
/// keys to filenames for fast lookup and can always be rebuilt by
/// [`reconcile`](Self::reconcile).
///
/// All I/O is synchronous and runs on the calling thread. The store
/// assumes single-writer access to its root: nothing locks the index file,
/// and concurrent writers will race on it. External changes to the image
/// folder are not auto-detected -- call [`mark_dirty`](Self::mark_dirty) or
/// [`reconcile`](Self::reconcile) after making them.
pub struct AnnotatedStore {
    root: PathBuf,
    images_dir: PathBuf,
    index_path: PathBuf,
    config: StoreConfig,
    index: IndexDocument,
    cache: QueryCache<Vec<SourceRecord>>,
    dirty: bool,
    path_scan_count: u64,
}

impl std::fmt::Debug for AnnotatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatedStore")
            .field("root", &self.root)
            .field("entries", &self.index.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Is this filename one of our annotated containers?
fn is_container_filename(name: &str) -> bool {
    name.contains(CONTAINER_MARKER) && is_image_path(name)
}

fn decode_jpeg_frame(bytes: &[u8]) -> StoreResult<ImageFrame> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| StoreError::ImageDecode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    ImageFrame::rgb8(width, height, rgb.into_raw())
        .map_err(|e| StoreError::ImageDecode(e.to_string()))
}

impl AnnotatedStore {
    /// Open (creating if needed) a store rooted at `root` with default
    /// configuration.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with_config(root, StoreConfig::default())
    }

    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// The index starts dirty: the first read-path operation reconciles it
    /// against the image folder.
    pub fn open_with_config(root: impl Into<PathBuf>, config: StoreConfig) -> StoreResult<Self> {
        let root = root.into();
        let images_dir = root.join(IMAGES_DIR);
        let index_path = root.join(INDEX_FILE);
        fs::create_dir_all(&images_dir)?;
        fs::create_dir_all(root.join(THUMBNAILS_DIR))?;

        let index = match fs::read(&index_path) {
            Ok(bytes) => match serde_json::from_slice::<IndexDocument>(&bytes) {
                Ok(document) => document,
                Err(e) => {
                    // The index is a rebuildable cache; a corrupt one is
                    // dropped and reconstructed on the first reconcile.
                    warn!("index document unreadable ({e}), rebuilding from containers");
                    IndexDocument::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexDocument::new(),
            Err(e) => return Err(e.into()),
        };

        let cache = QueryCache::new(config.query_cache_capacity);
        Ok(Self {
            root,
            images_dir,
            index_path,
            config,
            index,
            cache,
            dirty: true,
            path_scan_count: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the index as out of sync with the image folder. The next
    /// read-path operation will reconcile before answering.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn reconcile_if_dirty(&mut self) -> StoreResult<()> {
        if self.dirty {
            self.reconcile(false)?;
        }
        Ok(())
    }

    fn relativize(&self, path: &str) -> String {
        if let Some(base) = &self.config.source_base_path {
            let base = base.to_string_lossy();
            if let Some(rest) = path.strip_prefix(base.as_ref()) {
                return rest.trim_start_matches(['/', '\\']).to_string();
            }
        }
        path.to_string()
    }

    fn persist_index(&self) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.index)
            .map_err(|e| StoreError::IndexDocument(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.index_path)
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Decode the record embedded in a container file. The file, not the
    /// index, is the authority on record contents.
    fn read_record_from_container(path: &Path) -> StoreResult<SourceRecord> {
        let bytes = fs::read(path)?;
        let metadata = read_metadata(&bytes)?;
        let payload = metadata.payload.ok_or_else(|| {
            StoreError::CorruptContainer(format!("{} carries no record payload", path.display()))
        })?;
        Ok(SourceRecord::from_primitive(&payload)?)
    }

    // -----------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------

    /// Persist a record and its frame as a self-contained container file,
    /// then upsert the index.
    ///
    /// The container filename concatenates eight hex digits of the source
    /// hash (sampled content digest when the source file exists, hash of
    /// the logical key otherwise), eight hex digits of the record hash,
    /// and the cleaned source basename; non-image sources also carry the
    /// frame index. JPEG sources take the copy path -- original bytes with
    /// the metadata block spliced in -- everything else is written as an
    /// uncompressed TIFF of `frame`.
    ///
    /// The write goes through a temporary file and an atomic rename, so a
    /// failed save leaves no file at the final path and the index
    /// untouched. Returns the path of the stored container.
    pub fn save(&mut self, record: &SourceRecord, frame: &ImageFrame) -> StoreResult<PathBuf> {
        let mut stored = record.clone();
        stored.source_path = self.relativize(&record.source_path);
        let identifier = record_key(&stored.source_identifier());

        let record_primitive = stored.to_primitive();
        let mut payload = record_primitive.clone();
        if let Primitive::Map(ref mut map) = payload {
            map.insert(
                RECORD_VERSION_KEY.to_string(),
                Primitive::Int(RECORD_VERSION),
            );
        }
        let metadata = ImageMetadata {
            timestamp: stored.geo.as_ref().map(|fix| fix.timestamp),
            geo: stored.geo.as_ref().map(|fix| fix.position),
            payload: Some(payload),
        };

        let source_path = Path::new(&record.source_path);
        let source_exists = source_path.is_file();
        let hasher = SampledHasher::new(self.config.sample_threshold, self.config.sample_count)?;
        let source_hex = if source_exists {
            hasher.hash_file(source_path)?.short_hex()
        } else {
            ContentDigest::of_bytes(stored.source_identifier().as_bytes()).short_hex()
        };
        let record_hex =
            ContentDigest::of_bytes(record_primitive.to_json()?.as_bytes()).short_hex();
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "frame".to_string());
        let mut base = format!("{source_hex}{record_hex}_{stem}");
        if !is_image_path(&record.source_path) {
            base.push('_');
            base.push_str(&stored.source_index.to_string());
        }

        let source_ext = source_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());
        let jpeg_source =
            source_exists && matches!(source_ext.as_deref(), Some("jpg") | Some("jpeg"));

        let (filename, bytes) = if jpeg_source {
            let ext = source_ext.unwrap_or_else(|| "jpg".to_string());
            let source_bytes = fs::read(source_path)?;
            (
                format!("{base}.ann.{ext}"),
                patch_jpeg(&source_bytes, &metadata)?,
            )
        } else {
            (format!("{base}.ann.tiff"), write_tiff(frame, &metadata)?)
        };

        let final_path = self.images_dir.join(&filename);
        let mut tmp = NamedTempFile::new_in(&self.images_dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&final_path)
            .map_err(|e| StoreError::Io(e.error))?;

        // A re-save of the same logical key under new content gets a new
        // filename; drop the superseded container so a later reconcile
        // cannot resurrect the old record.
        if let Some(previous) = self.index.get(&identifier) {
            if previous.filename != filename {
                let old_path = self.images_dir.join(&previous.filename);
                if let Err(e) = fs::remove_file(&old_path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("could not remove superseded container {old_path:?}: {e}");
                    }
                }
            }
        }

        self.index.insert(
            identifier,
            IndexRecord {
                filename: filename.clone(),
                data: record_primitive,
            },
        );
        self.persist_index()?;
        self.cache.clear();
        debug!(identifier, filename = %filename, "saved annotated container");
        Ok(final_path)
    }

    // -----------------------------------------------------------------
    // Lookup and load
    // -----------------------------------------------------------------

    /// Index-only lookup by stable record key.
    pub fn lookup_by_identifier(&mut self, identifier: u64) -> StoreResult<Option<StoredEntry>> {
        self.reconcile_if_dirty()?;
        match self.index.get(&identifier) {
            Some(entry) => Ok(Some(StoredEntry {
                identifier,
                filename: entry.filename.clone(),
                record: SourceRecord::from_primitive(&entry.data)?,
            })),
            None => Ok(None),
        }
    }

    /// Load the frame and record behind an identifier.
    ///
    /// The index resolves only the filename; the record is re-read from
    /// the container's embedded metadata, which guards against index/file
    /// divergence for everything except the filename mapping itself.
    pub fn load(&mut self, identifier: u64) -> StoreResult<Option<(ImageFrame, SourceRecord)>> {
        self.reconcile_if_dirty()?;
        let Some(entry) = self.index.get(&identifier) else {
            return Ok(None);
        };
        let path = self.images_dir.join(&entry.filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (frame, metadata) = match detect_container(&bytes) {
            Some(Container::Tiff) => read_tiff(&bytes)?,
            Some(Container::Jpeg) => {
                let metadata = read_jpeg_metadata(&bytes)?;
                (decode_jpeg_frame(&bytes)?, metadata)
            }
            None => {
                return Err(StoreError::CorruptContainer(format!(
                    "{} is not a recognized container",
                    entry.filename
                )))
            }
        };
        let payload = metadata.payload.ok_or_else(|| {
            StoreError::CorruptContainer(format!("{} carries no record payload", entry.filename))
        })?;
        let record = SourceRecord::from_primitive(&payload)?;
        Ok(Some((frame, record)))
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Full index scan with a structural predicate.
    pub fn query(&mut self, filter: &Filter) -> StoreResult<Vec<SourceRecord>> {
        self.reconcile_if_dirty()?;
        let mut matches = Vec::new();
        for entry in self.index.values() {
            let record = SourceRecord::from_primitive(&entry.data)?;
            if filter.matches(&record) {
                matches.push(record);
            }
        }
        Ok(matches)
    }

    /// Free-text query across reference nicknames, source paths, and
    /// annotation labels, descriptions, and tags. Blank text returns
    /// everything.
    pub fn query_by_text(&mut self, text: &str) -> StoreResult<Vec<SourceRecord>> {
        self.query(&Filter::text_search(text))
    }

    /// Query by source path -- either a single path or a `;`-joined
    /// multi-path naming one logical multi-image sequence.
    ///
    /// For a multi-path, records matching any sub-path are rewritten to
    /// the joined path with `source_index` set to the sub-path's position,
    /// producing synthetic records for the virtual sequence. Results are
    /// cached by the verbatim input string in a small LRU; a cache hit
    /// never touches the index.
    pub fn query_by_paths(&mut self, path: &str) -> StoreResult<Vec<SourceRecord>> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(hit);
        }
        self.reconcile_if_dirty()?;
        let result = self.scan_paths(path)?;
        self.cache.put(path.to_string(), result.clone());
        Ok(result)
    }

    fn scan_paths(&mut self, path: &str) -> StoreResult<Vec<SourceRecord>> {
        self.path_scan_count += 1;
        let paths: Vec<&str> = path.split(birdseye_types::MULTIPATH_SEPARATOR).collect();
        let mut shortlist = Vec::new();
        for entry in self.index.values() {
            let record = SourceRecord::from_primitive(&entry.data)?;
            if paths.contains(&record.source_path.as_str()) {
                shortlist.push(record);
            }
        }
        if paths.len() == 1 {
            return Ok(shortlist);
        }
        let rewritten = shortlist
            .into_iter()
            .filter_map(|mut record| {
                let position = paths.iter().position(|p| *p == record.source_path)?;
                record.source_path = path.to_string();
                record.source_index = position as u32;
                Some(record)
            })
            .collect();
        Ok(rewritten)
    }

    /// Convenience: the one record at `(path, index)`, if any.
    pub fn lookup_by_path_and_index(
        &mut self,
        path: &str,
        index: u32,
    ) -> StoreResult<Option<SourceRecord>> {
        let records = self.query_by_paths(path)?;
        Ok(records
            .into_iter()
            .find(|record| record.source_index == index))
    }

    // -----------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------

    /// Remove an entry and its backing container file.
    ///
    /// Order: file first, then index. If the file removal fails, both
    /// artifacts are left intact and the error propagates. If the index
    /// persist fails after the file is gone, the dangling index entry is
    /// surfaced as [`StoreError::InconsistentDelete`] and cleaned up by
    /// the next reconcile. Returns `false` for unknown identifiers.
    pub fn delete(&mut self, identifier: u64) -> StoreResult<bool> {
        let Some(entry) = self.index.get(&identifier).cloned() else {
            return Ok(false);
        };
        let path = self.images_dir.join(&entry.filename);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(identifier, "backing file already gone");
            }
            Err(e) => return Err(e.into()),
        }
        self.index.remove(&identifier);
        if let Err(e) = self.persist_index() {
            return Err(StoreError::InconsistentDelete {
                identifier,
                filename: entry.filename,
                reason: e.to_string(),
            });
        }
        self.cache.clear();
        debug!(identifier, filename = %entry.filename, "deleted annotated container");
        Ok(true)
    }

    // -----------------------------------------------------------------
    // Reconcile
    // -----------------------------------------------------------------

    /// Resynchronize the index with the image folder: entries whose
    /// backing file vanished are dropped, unindexed container files are
    /// decoded and adopted (unreadable ones are logged and skipped). With
    /// `full`, the query cache is cleared first. Marks the index clean.
    pub fn reconcile(&mut self, full: bool) -> StoreResult<()> {
        if full {
            self.cache.clear();
        }

        let mut on_disk = std::collections::BTreeSet::new();
        for entry in WalkDir::new(&self.images_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_container_filename(&name) {
                on_disk.insert(name);
            }
        }

        let before = self.index.len();
        self.index.retain(|_, entry| on_disk.contains(&entry.filename));
        let dropped = before - self.index.len();

        let indexed: std::collections::BTreeSet<String> = self
            .index
            .values()
            .map(|entry| entry.filename.clone())
            .collect();
        let mut adopted = 0usize;
        for filename in on_disk.difference(&indexed) {
            let path = self.images_dir.join(filename);
            match Self::read_record_from_container(&path) {
                Ok(record) => {
                    let identifier = record_key(&record.source_identifier());
                    self.index.insert(
                        identifier,
                        IndexRecord {
                            filename: filename.clone(),
                            data: record.to_primitive(),
                        },
                    );
                    adopted += 1;
                }
                Err(e) => warn!("skipping unreadable container {path:?}: {e}"),
            }
        }

        self.persist_index()?;
        self.dirty = false;
        info!(adopted, dropped, entries = self.index.len(), "reconciled index");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn path_scans(&self) -> u64 {
        self.path_scan_count
    }
}

#[cfg(test)]
mod tests {
    use birdseye_types::{AnnotationBox, GeoFix, GeoPosition, RecordReference, Verdict};
    use chrono::{FixedOffset, TimeZone};
    use image::ImageEncoder;

    use super::*;

    fn gradient_frame() -> ImageFrame {
        let (width, height) = (16u32, 12u32);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            for col in 0..width {
                pixels.push((row * 20) as u8);
                pixels.push((col * 15) as u8);
                pixels.push(128);
            }
        }
        ImageFrame::rgb8(width, height, pixels).unwrap()
    }

    fn video_record(path: &str, index: u32) -> SourceRecord {
        let offset = FixedOffset::east_opt(-4 * 3600).unwrap();
        let mut ann = AnnotationBox::new((872, 3704, 100, 100), "orange");
        ann.description = "orange jacket behind bush".to_string();
        ann.value = Verdict::Positive;
        ann.tags = vec!["reviewed".to_string()];
        SourceRecord {
            source_index: index,
            source_time_s: Some(index as f64 / 30.0),
            channel: birdseye_types::channels::VISUAL.to_string(),
            annotations: Some(vec![ann]),
            geo: Some(GeoFix::new(
                offset.with_ymd_and_hms(2021, 10, 1, 16, 0, 0).unwrap(),
                GeoPosition::new(37.7749, -122.4194, Some(476.43)),
            )),
            record_ref: Some(RecordReference {
                nickname: Some("test_collection".to_string()),
                ..RecordReference::default()
            }),
            ..SourceRecord::new(path)
        }
    }

    fn image_record(path: &str) -> SourceRecord {
        let mut record = video_record(path, 0);
        record.source_time_s = None;
        record
    }

    fn encode_jpeg(frame: &ImageFrame) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
            .write_image(
                frame.pixels(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .unwrap();
        bytes
    }

    // -----------------------------------------------------------------
    // Save / lookup / load
    // -----------------------------------------------------------------

    #[test]
    fn save_lookup_load_roundtrip_on_the_fallback_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let record = video_record("/footage/cutblock.mov", 21);
        let frame = gradient_frame();

        let stored_path = store.save(&record, &frame).unwrap();
        assert!(stored_path.exists());
        let filename = stored_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(filename.ends_with(".ann.tiff"));
        assert!(filename.contains("_cutblock_21."));
        assert!(dir.path().join(INDEX_FILE).exists());

        let identifier = record_key(&record.source_identifier());
        let entry = store.lookup_by_identifier(identifier).unwrap().unwrap();
        assert_eq!(entry.identifier, identifier);
        assert_eq!(entry.filename, filename);
        assert_eq!(entry.record, record);

        let (loaded_frame, loaded_record) = store.load(identifier).unwrap().unwrap();
        assert_eq!(loaded_record, record);
        assert_eq!(loaded_frame.pixels(), frame.pixels());
    }

    #[test]
    fn jpeg_sources_take_the_copy_path() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("sources");
        fs::create_dir_all(&source_dir).unwrap();
        let frame = gradient_frame();
        let source_path = source_dir.join("ridge.jpg");
        let jpeg_bytes = encode_jpeg(&frame);
        fs::write(&source_path, &jpeg_bytes).unwrap();

        let mut store = AnnotatedStore::open(dir.path().join("store")).unwrap();
        let record = image_record(&source_path.to_string_lossy());
        let stored_path = store.save(&record, &frame).unwrap();
        let filename = stored_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(filename.ends_with(".ann.jpg"));

        let identifier = record_key(&record.source_identifier());
        let (loaded_frame, loaded_record) = store.load(identifier).unwrap().unwrap();
        assert_eq!(loaded_record, record);
        assert_eq!(loaded_frame.width(), frame.width());
        assert_eq!(loaded_frame.height(), frame.height());
    }

    #[test]
    fn resave_replaces_the_entry_whole() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let frame = gradient_frame();
        let record = video_record("/footage/cutblock.mov", 21);
        store.save(&record, &frame).unwrap();

        let mut edited = record.clone();
        edited.description = "second pass".to_string();
        store.save(&edited, &frame).unwrap();

        assert_eq!(store.len(), 1);
        let identifier = record_key(&record.source_identifier());
        let entry = store.lookup_by_identifier(identifier).unwrap().unwrap();
        assert_eq!(entry.record, edited);

        // The superseded container is gone; exactly one remains.
        let containers = fs::read_dir(dir.path().join(IMAGES_DIR))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| is_container_filename(&e.file_name().to_string_lossy()))
            .count();
        assert_eq!(containers, 1);
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    #[test]
    fn text_query_spans_nickname_path_and_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let frame = gradient_frame();
        store
            .save(&video_record("/footage/cutblock.mov", 3), &frame)
            .unwrap();
        store
            .save(&image_record("/photos/basalt_canyon.jpg"), &frame)
            .unwrap();

        assert_eq!(store.query_by_text("").unwrap().len(), 2);
        assert_eq!(store.query_by_text("test_collection").unwrap().len(), 2);
        assert_eq!(store.query_by_text("basalt").unwrap().len(), 1);
        assert_eq!(store.query_by_text("orange").unwrap().len(), 2);
        assert_eq!(store.query_by_text("no such needle").unwrap().len(), 0);
    }

    #[test]
    fn structural_query_applies_the_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let frame = gradient_frame();
        store
            .save(&video_record("/footage/cutblock.mov", 3), &frame)
            .unwrap();
        store
            .save(&video_record("/footage/cutblock.mov", 4), &frame)
            .unwrap();

        let by_index = store.query(&Filter::IndexEquals(4)).unwrap();
        assert_eq!(by_index.len(), 1);
        assert_eq!(by_index[0].source_index, 4);

        let by_label = store
            .query(&Filter::AnyAnnotation(
                crate::filter::AnnotationFilter::LabelEquals("orange".into()),
            ))
            .unwrap();
        assert_eq!(by_label.len(), 2);
    }

    #[test]
    fn multipath_query_rewrites_matches() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let record = image_record("/gallery/b.jpg");
        store.save(&record, &gradient_frame()).unwrap();

        let joined = "/gallery/a.jpg;/gallery/b.jpg;/gallery/c.jpg";
        let results = store.query_by_paths(joined).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_path, joined);
        assert_eq!(results[0].source_index, 1);
        // Everything else about the record is untouched.
        assert_eq!(results[0].annotations, record.annotations);

        let single = store.query_by_paths("/gallery/b.jpg").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0], record);

        assert!(store.query_by_paths("/gallery/a.jpg").unwrap().is_empty());
    }

    #[test]
    fn lookup_by_path_and_index_picks_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let frame = gradient_frame();
        store
            .save(&video_record("/footage/cutblock.mov", 3), &frame)
            .unwrap();
        store
            .save(&video_record("/footage/cutblock.mov", 4), &frame)
            .unwrap();

        let found = store
            .lookup_by_path_and_index("/footage/cutblock.mov", 4)
            .unwrap()
            .unwrap();
        assert_eq!(found.source_index, 4);
        assert!(store
            .lookup_by_path_and_index("/footage/cutblock.mov", 9)
            .unwrap()
            .is_none());
    }

    // -----------------------------------------------------------------
    // Path-query cache
    // -----------------------------------------------------------------

    #[test]
    fn cache_hit_skips_the_index_scan_and_lru_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            query_cache_capacity: 2,
            ..StoreConfig::default()
        };
        let mut store = AnnotatedStore::open_with_config(dir.path(), config).unwrap();
        store
            .save(&image_record("/gallery/a.jpg"), &gradient_frame())
            .unwrap();
        store.reconcile(false).unwrap();

        store.query_by_paths("/gallery/a.jpg").unwrap();
        store.query_by_paths("/gallery/b.jpg").unwrap();
        assert_eq!(store.path_scans(), 2);

        // Hits do not rescan.
        store.query_by_paths("/gallery/a.jpg").unwrap();
        assert_eq!(store.path_scans(), 2);

        // A third key evicts the least recently used ("/gallery/b.jpg").
        store.query_by_paths("/gallery/c.jpg").unwrap();
        store.query_by_paths("/gallery/a.jpg").unwrap();
        assert_eq!(store.path_scans(), 3);
        store.query_by_paths("/gallery/b.jpg").unwrap();
        assert_eq!(store.path_scans(), 4);
    }

    #[test]
    fn save_invalidates_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let frame = gradient_frame();
        store.save(&image_record("/gallery/a.jpg"), &frame).unwrap();

        assert!(store.query_by_paths("/gallery/b.jpg").unwrap().is_empty());
        store.save(&image_record("/gallery/b.jpg"), &frame).unwrap();
        // The stale empty result must not come back.
        assert_eq!(store.query_by_paths("/gallery/b.jpg").unwrap().len(), 1);
    }

    // -----------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------

    #[test]
    fn delete_removes_both_entry_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let record = video_record("/footage/cutblock.mov", 21);
        let stored_path = store.save(&record, &gradient_frame()).unwrap();
        let identifier = record_key(&record.source_identifier());

        assert!(store.delete(identifier).unwrap());
        assert!(store.lookup_by_identifier(identifier).unwrap().is_none());
        assert!(!stored_path.exists());
        assert!(store.load(identifier).unwrap().is_none());

        // Second delete reports the absence.
        assert!(!store.delete(identifier).unwrap());
    }

    // -----------------------------------------------------------------
    // Reconcile and the dirty flag
    // -----------------------------------------------------------------

    #[test]
    fn reconcile_adopts_containers_from_other_processes() {
        let dir = tempfile::tempdir().unwrap();
        let mut origin = AnnotatedStore::open(dir.path().join("origin")).unwrap();
        let record = video_record("/footage/cutblock.mov", 21);
        let stored_path = origin.save(&record, &gradient_frame()).unwrap();

        let mut adopter = AnnotatedStore::open(dir.path().join("adopter")).unwrap();
        let target = dir
            .path()
            .join("adopter")
            .join(IMAGES_DIR)
            .join(stored_path.file_name().unwrap());
        fs::copy(&stored_path, &target).unwrap();

        // The store starts dirty, so the first read reconciles and adopts.
        let records = store_query_all(&mut adopter);
        assert_eq!(records, vec![record.clone()]);

        let identifier = record_key(&record.source_identifier());
        let (_, loaded) = adopter.load(identifier).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn reconcile_drops_entries_whose_files_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        let record = video_record("/footage/cutblock.mov", 21);
        let stored_path = store.save(&record, &gradient_frame()).unwrap();
        let identifier = record_key(&record.source_identifier());
        assert!(store.lookup_by_identifier(identifier).unwrap().is_some());

        fs::remove_file(&stored_path).unwrap();
        // External edits are not auto-detected...
        assert_eq!(store.len(), 1);
        // ...until the caller marks the store dirty.
        store.mark_dirty();
        assert!(store.lookup_by_identifier(identifier).unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn corrupt_index_documents_are_rebuilt_from_containers() {
        let dir = tempfile::tempdir().unwrap();
        let record = video_record("/footage/cutblock.mov", 21);
        {
            let mut store = AnnotatedStore::open(dir.path()).unwrap();
            store.save(&record, &gradient_frame()).unwrap();
        }
        fs::write(dir.path().join(INDEX_FILE), b"{ not json").unwrap();

        let mut reopened = AnnotatedStore::open(dir.path()).unwrap();
        assert!(reopened.is_dirty());
        let records = store_query_all(&mut reopened);
        assert_eq!(records, vec![record]);
        assert!(!reopened.is_dirty());
    }

    #[test]
    fn unreadable_containers_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotatedStore::open(dir.path()).unwrap();
        store
            .save(&video_record("/footage/cutblock.mov", 21), &gradient_frame())
            .unwrap();
        fs::write(
            dir.path().join(IMAGES_DIR).join("junk.ann.tiff"),
            b"not a container",
        )
        .unwrap();

        store.mark_dirty();
        assert_eq!(store_query_all(&mut store).len(), 1);
    }

    fn store_query_all(store: &mut AnnotatedStore) -> Vec<SourceRecord> {
        store.query(&Filter::All).unwrap()
    }
}
