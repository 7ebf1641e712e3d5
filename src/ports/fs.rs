use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{RenderError, WriteError};
use crate::model::*;
use crate::report::DailySummary;

use super::*;

/// Write `bytes` to `path` via a temp file + rename so readers never see a
/// half-written file.
async fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn read_json_map<K, V>(path: &Path) -> io::Result<BTreeMap<K, V>>
where
    K: Ord + serde::de::DeserializeOwned,
    V: serde::de::DeserializeOwned,
{
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e),
    }
}

// ── Document store ───────────────────────────────────────────────

/// One pretty-printed JSON document per booking: `<dir>/<booking_id>.json`.
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, booking_id: BookingId) -> PathBuf {
        self.dir.join(format!("{booking_id}.json"))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn exists(&self, booking_id: BookingId) -> Result<bool, WriteError> {
        tokio::fs::try_exists(self.path_for(booking_id))
            .await
            .map_err(|e| WriteError::io("document store", e))
    }

    async fn insert(&self, document: &BookingDocument) -> Result<Ack, WriteError> {
        let body = serde_json::to_vec_pretty(document)
            .map_err(|e| WriteError::io("document store", e))?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(document.booking_id))
            .await;
        let mut file = match file {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WriteError::Rejected {
                    store: "document store",
                    booking_id: document.booking_id,
                    reason: "already exists".into(),
                });
            }
            Err(e) => return Err(WriteError::io("document store", e)),
        };
        file.write_all(&body)
            .await
            .map_err(|e| WriteError::io("document store", e))?;
        file.sync_all()
            .await
            .map_err(|e| WriteError::io("document store", e))?;
        Ok(Ack)
    }

    async fn find(&self, lookup: &Lookup) -> Result<Vec<BookingDocument>, WriteError> {
        if let Lookup::BookingId(id) = lookup {
            return match tokio::fs::read(self.path_for(*id)).await {
                Ok(bytes) => serde_json::from_slice(&bytes)
                    .map(|doc| vec![doc])
                    .map_err(|e| WriteError::io("document store", e)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(WriteError::io("document store", e)),
            };
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| WriteError::io("document store", e))?;
        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WriteError::io("document store", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) => {
                    warn!("skipping unreadable document {}: {e}", path.display());
                    continue;
                }
            };
            match serde_json::from_slice::<BookingDocument>(&bytes) {
                Ok(doc) if lookup.matches(&doc) => found.push(doc),
                Ok(_) => {}
                Err(e) => warn!("skipping malformed document {}: {e}", path.display()),
            }
        }
        found.sort_by_key(|d| d.booking_id);
        Ok(found)
    }
}

// ── System of record ─────────────────────────────────────────────

/// Keeps `allocations.json` (booking id → campground id) and
/// `summaries.json` (`<campground>/<date>` → summary), rewritten whole on
/// each call.
pub struct FsSystemOfRecord {
    allocations: PathBuf,
    summaries: PathBuf,
    lock: Mutex<()>,
}

impl FsSystemOfRecord {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            allocations: dir.join("allocations.json"),
            summaries: dir.join("summaries.json"),
            lock: Mutex::new(()),
        })
    }

    pub async fn allocations(&self) -> io::Result<BTreeMap<BookingId, CampgroundId>> {
        let _guard = self.lock.lock().await;
        read_json_map(&self.allocations).await
    }
}

#[async_trait]
impl SystemOfRecord for FsSystemOfRecord {
    async fn record_allocation(
        &self,
        booking_id: BookingId,
        campground_id: CampgroundId,
    ) -> Result<Ack, WriteError> {
        let _guard = self.lock.lock().await;
        let mut map: BTreeMap<BookingId, CampgroundId> = read_json_map(&self.allocations)
            .await
            .map_err(|e| WriteError::io("system of record", e))?;
        map.insert(booking_id, campground_id);
        let body = serde_json::to_vec_pretty(&map).map_err(|e| WriteError::io("system of record", e))?;
        replace_file(&self.allocations, &body)
            .await
            .map_err(|e| WriteError::io("system of record", e))?;
        Ok(Ack)
    }

    async fn record_summary(&self, summary: &DailySummary) -> Result<Ack, WriteError> {
        let _guard = self.lock.lock().await;
        let mut map: BTreeMap<String, DailySummary> = read_json_map(&self.summaries)
            .await
            .map_err(|e| WriteError::io("system of record", e))?;
        map.insert(
            format!("{}/{}", summary.campground_id, summary.summary_date),
            summary.clone(),
        );
        let body = serde_json::to_vec_pretty(&map).map_err(|e| WriteError::io("system of record", e))?;
        replace_file(&self.summaries, &body)
            .await
            .map_err(|e| WriteError::io("system of record", e))?;
        Ok(Ack)
    }
}

// ── Confirmations ────────────────────────────────────────────────

/// Writes `confirmation_<booking_id>.txt` under `dir`; the handle is the path.
pub struct TextConfirmationRenderer {
    dir: PathBuf,
}

impl TextConfirmationRenderer {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl ArtifactGenerator for TextConfirmationRenderer {
    async fn render(&self, booking: &Booking, window: &Window) -> Result<ArtifactHandle, RenderError> {
        let text = confirmation_text(booking, window)?;
        let path = self.dir.join(format!("confirmation_{}.txt", booking.booking_id));
        replace_file(&path, text.as_bytes())
            .await
            .map_err(|e| RenderError::Io(e.to_string()))?;
        Ok(ArtifactHandle(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use ulid::Ulid;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("campsync_test_fs")
            .join(format!("{name}_{}", Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn booking(id: BookingId, name: &str) -> Booking {
        let mut b = Booking::from(BookingRecord {
            booking_id: id,
            customer_id: id,
            customer_name: Some(name.into()),
            booking_date: "2024-09-01".into(),
            arrival_date: "2024-09-04".into(),
            campground_id: 1,
            campsite_size: SizeTier::Small,
            num_campsites: 1,
        });
        b.assign(&Unit::new(1, SizeTier::Small, Decimal::from(50)), Decimal::from(350));
        b
    }

    fn window() -> Window {
        Window::weeks(NaiveDate::from_ymd_opt(2024, 9, 7).unwrap(), 1).unwrap()
    }

    #[tokio::test]
    async fn document_insert_is_create_only() {
        let store = FsDocumentStore::open(test_dir("docs")).await.unwrap();
        let doc = BookingDocument::from_booking(&booking(1, "Ada"), Some(window()), 9, None);

        assert!(!store.exists(1).await.unwrap());
        tokio_test::assert_ok!(store.insert(&doc).await);
        assert!(store.exists(1).await.unwrap());
        let err = tokio_test::assert_err!(store.insert(&doc).await);
        assert!(matches!(err, WriteError::Rejected { booking_id: 1, .. }));
    }

    #[tokio::test]
    async fn documents_found_by_id_and_name() {
        let store = FsDocumentStore::open(test_dir("find")).await.unwrap();
        for (id, name) in [(1, "Ada Lovelace"), (2, "Grace Hopper"), (3, "Ada Byron")] {
            let doc = BookingDocument::from_booking(&booking(id, name), Some(window()), 9, None);
            store.insert(&doc).await.unwrap();
        }

        let by_id = store.find(&Lookup::BookingId(2)).await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].customer_name.as_deref(), Some("Grace Hopper"));

        let by_name = store.find(&Lookup::parse("ada").unwrap()).await.unwrap();
        let ids: Vec<_> = by_name.iter().map(|d| d.booking_id).collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(store.find(&Lookup::BookingId(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn allocation_upsert_is_idempotent() {
        let sor = FsSystemOfRecord::open(test_dir("sor")).await.unwrap();
        sor.record_allocation(1, 1121132).await.unwrap();
        sor.record_allocation(1, 1121132).await.unwrap();
        sor.record_allocation(2, 1121132).await.unwrap();
        let map = sor.allocations().await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1], 1121132);
    }

    #[tokio::test]
    async fn summary_upsert_keyed_by_day() {
        let dir = test_dir("summary");
        let sor = FsSystemOfRecord::open(&dir).await.unwrap();
        let mut summary = DailySummary {
            campground_id: 5,
            summary_date: NaiveDate::from_ymd_opt(2024, 9, 7).unwrap(),
            total_sales: Decimal::from(350),
            total_bookings: 1,
        };
        sor.record_summary(&summary).await.unwrap();
        summary.total_bookings = 2;
        sor.record_summary(&summary).await.unwrap();

        let bytes = std::fs::read(dir.join("summaries.json")).unwrap();
        let map: BTreeMap<String, DailySummary> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["5/2024-09-07"].total_bookings, 2);
    }

    #[tokio::test]
    async fn confirmation_written_to_disk() {
        let dir = test_dir("confirmations");
        let renderer = TextConfirmationRenderer::open(&dir).await.unwrap();
        let handle = renderer.render(&booking(7, "Ada"), &window()).await.unwrap();
        assert!(handle.0.ends_with("confirmation_7.txt"));
        let text = std::fs::read_to_string(dir.join("confirmation_7.txt")).unwrap();
        assert!(text.contains("Booking ID: 7"));
    }
}
