//! Persistent [`SyncGateway`] backed by a local SQLite file.
//!
//! Used by offline-first and desktop shells. Editable fields are stored as a
//! JSON document next to the indexed columns.

use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::gateway::{ChangeNotice, GatewayError, SyncGateway};
use crate::model::{
    ActorId, FavoriteRelation, Listing, ListingFields, ListingFilter, ListingId, ListingPatch,
    UnixTimeMs,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS listings (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        data TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id);
    CREATE INDEX IF NOT EXISTS idx_listings_created ON listings(created_at DESC);

    CREATE TABLE IF NOT EXISTS favorites (
        actor_id TEXT NOT NULL,
        listing_id TEXT NOT NULL,
        PRIMARY KEY (actor_id, listing_id)
    );
"#;

const SELECT_LISTING: &str = "SELECT id, owner_id, created_at, data FROM listings";

type Row = (String, String, i64, String);

pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<ChangeNotice>,
}

impl SqliteGateway {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, GatewayError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, GatewayError> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    /// rusqlite is blocking, so every statement runs on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, GatewayError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut conn)
        })
        .await
        .map_err(|e| GatewayError::Storage(format!("sqlite task failed: {e}")))?
    }

    fn notify(&self, notice: ChangeNotice) {
        let _ = self.changes.send(notice);
    }
}

fn storage(e: rusqlite::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}

fn decode((id, owner_id, created_at, data): Row) -> Result<Listing, GatewayError> {
    let fields: ListingFields = serde_json::from_str(&data)
        .map_err(|e| GatewayError::Storage(format!("corrupted listing {id}: {e}")))?;
    Ok(Listing {
        id: ListingId::new(id),
        owner_id: ActorId::new(owner_id),
        created_at: UnixTimeMs(u64::try_from(created_at).unwrap_or_default()),
        fields,
    })
}

fn encode(fields: &ListingFields) -> Result<String, GatewayError> {
    serde_json::to_string(fields).map_err(|e| GatewayError::Storage(e.to_string()))
}

fn to_i64(ts: UnixTimeMs) -> i64 {
    i64::try_from(ts.0).unwrap_or(i64::MAX)
}

fn query_listings(
    conn: &Connection,
    sql: &str,
    args: &[&dyn ToSql],
) -> Result<Vec<Listing>, GatewayError> {
    let mut stmt = conn.prepare(sql).map_err(storage)?;
    let rows = stmt
        .query_map(args, |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
        .map_err(storage)?
        .collect::<Result<Vec<Row>, _>>()
        .map_err(storage)?;
    rows.into_iter().map(decode).collect()
}

fn find_listing(conn: &Connection, id: &ListingId) -> Result<Option<Listing>, GatewayError> {
    conn.query_row(
        &format!("{SELECT_LISTING} WHERE id = ?1"),
        params![id.as_str()],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )
    .optional()
    .map_err(storage)?
    .map(decode)
    .transpose()
}

#[async_trait::async_trait]
impl SyncGateway for SqliteGateway {
    async fn fetch_all(&self, filter: &ListingFilter) -> Result<Vec<Listing>, GatewayError> {
        let filter = filter.clone();
        self.with_conn(move |conn| match &filter {
            ListingFilter::All => query_listings(
                conn,
                &format!("{SELECT_LISTING} ORDER BY created_at DESC, rowid DESC"),
                &[],
            ),
            ListingFilter::OwnedBy(owner) => query_listings(
                conn,
                &format!("{SELECT_LISTING} WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC"),
                &[&owner.as_str()],
            ),
        })
        .await
    }

    async fn fetch_one(&self, id: &ListingId) -> Result<Listing, GatewayError> {
        let id = id.clone();
        self.with_conn(move |conn| {
            find_listing(conn, &id)?.ok_or_else(|| GatewayError::NotFound(id.clone()))
        })
        .await
    }

    #[instrument(skip(self, draft), fields(owner = %owner))]
    async fn create(&self, owner: &ActorId, draft: &ListingFields) -> Result<Listing, GatewayError> {
        let owner = owner.clone();
        let draft = draft.clone();
        let listing = self
            .with_conn(move |conn| {
                let latest: i64 = conn
                    .query_row("SELECT COALESCE(MAX(created_at), 0) FROM listings", [], |r| {
                        r.get(0)
                    })
                    .map_err(storage)?;
                let created_at = UnixTimeMs::now().0.max(u64::try_from(latest).unwrap_or(0) + 1);
                let listing = Listing {
                    id: ListingId::new(uuid::Uuid::new_v4().to_string()),
                    owner_id: owner,
                    created_at: UnixTimeMs(created_at),
                    fields: draft,
                };
                conn.execute(
                    "INSERT INTO listings (id, owner_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        listing.id.as_str(),
                        listing.owner_id.as_str(),
                        to_i64(listing.created_at),
                        encode(&listing.fields)?,
                    ],
                )
                .map_err(storage)?;
                Ok(listing)
            })
            .await?;
        debug!(listing_id = %listing.id, "listing persisted");
        self.notify(ChangeNotice::Inserted {
            listing_id: listing.id.clone(),
        });
        Ok(listing)
    }

    #[instrument(skip(self, patch), fields(listing_id = %id))]
    async fn update(&self, id: &ListingId, patch: &ListingPatch) -> Result<Listing, GatewayError> {
        let target = id.clone();
        let patch = patch.clone();
        let listing = self
            .with_conn(move |conn| {
                let tx = conn.transaction().map_err(storage)?;
                let mut listing = find_listing(&tx, &target)?
                    .ok_or_else(|| GatewayError::NotFound(target.clone()))?;
                patch.apply_to(&mut listing.fields);
                tx.execute(
                    "UPDATE listings SET data = ?1 WHERE id = ?2",
                    params![encode(&listing.fields)?, target.as_str()],
                )
                .map_err(storage)?;
                tx.commit().map_err(storage)?;
                Ok(listing)
            })
            .await?;
        self.notify(ChangeNotice::Updated {
            listing_id: id.clone(),
        });
        Ok(listing)
    }

    #[instrument(skip(self), fields(listing_id = %id))]
    async fn delete(&self, id: &ListingId) -> Result<(), GatewayError> {
        let target = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(storage)?;
            let removed = tx
                .execute("DELETE FROM listings WHERE id = ?1", params![target.as_str()])
                .map_err(storage)?;
            if removed == 0 {
                return Err(GatewayError::NotFound(target.clone()));
            }
            tx.execute(
                "DELETE FROM favorites WHERE listing_id = ?1",
                params![target.as_str()],
            )
            .map_err(storage)?;
            tx.commit().map_err(storage)
        })
        .await?;
        self.notify(ChangeNotice::Deleted {
            listing_id: id.clone(),
        });
        Ok(())
    }

    #[instrument(skip(self), fields(actor = %actor, listing_id = %listing))]
    async fn toggle_relation(
        &self,
        actor: &ActorId,
        listing: &ListingId,
        desired: bool,
    ) -> Result<(), GatewayError> {
        let (actor_id, listing_id) = (actor.clone(), listing.clone());
        let changed = self
            .with_conn(move |conn| {
                let sql = if desired {
                    if find_listing(conn, &listing_id)?.is_none() {
                        return Err(GatewayError::NotFound(listing_id.clone()));
                    }
                    "INSERT OR IGNORE INTO favorites (actor_id, listing_id) VALUES (?1, ?2)"
                } else {
                    "DELETE FROM favorites WHERE actor_id = ?1 AND listing_id = ?2"
                };
                conn.execute(sql, params![actor_id.as_str(), listing_id.as_str()])
                    .map_err(storage)
            })
            .await?;
        if changed > 0 {
            self.notify(ChangeNotice::RelationChanged {
                actor_id: actor.clone(),
                listing_id: listing.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_relations(&self, actor: &ActorId) -> Result<Vec<FavoriteRelation>, GatewayError> {
        let actor = actor.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare("SELECT listing_id FROM favorites WHERE actor_id = ?1 ORDER BY listing_id")
                .map_err(storage)?;
            let ids = stmt
                .query_map(params![actor.as_str()], |r| r.get::<_, String>(0))
                .map_err(storage)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;
            Ok(ids
                .into_iter()
                .map(|id| FavoriteRelation {
                    actor_id: actor.clone(),
                    listing_id: ListingId::new(id),
                })
                .collect())
        })
        .await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChangeNotice>> {
        Some(self.changes.subscribe())
    }
}
