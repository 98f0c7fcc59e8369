//! SQLite-backed chain persistence
//!
//! Headers and entries are stored as MessagePack blobs in a single
//! append-only table; the rowid gives chain order.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::ChainStore;
use crate::entry::Entry;
use crate::error::Result;
use crate::hash::{Hash, HashSpec};
use crate::header::Header;

pub struct SqliteChainStore {
    db: Connection,
    spec: HashSpec,
}

impl SqliteChainStore {
    /// Open or create `chain.db` in `data_dir`.
    pub fn open(data_dir: &Path, spec: HashSpec) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("chain.db");
        let db = Connection::open(&db_path)?;
        Self::init(db, spec)?.logged(&db_path)
    }

    /// A store in a private in-memory database.
    pub fn open_in_memory(spec: HashSpec) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, spec)
    }

    fn init(db: Connection, spec: HashSpec) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS chain (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                header_hash TEXT NOT NULL,
                entry_hash TEXT NOT NULL,
                entry_type TEXT NOT NULL,
                header BLOB NOT NULL,
                entry BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chain_entry_hash ON chain(entry_hash);",
        )?;
        Ok(Self { db, spec })
    }

    fn logged(self, path: &Path) -> Result<Self> {
        info!(path = %path.display(), length = self.length()?, "Chain store opened");
        Ok(self)
    }
}

fn decode_row(header: Vec<u8>, entry: Vec<u8>) -> Result<(Header, Entry)> {
    let header: Header = rmp_serde::from_slice(&header)?;
    let entry = Entry::unmarshal(&entry)?;
    Ok((header, entry))
}

impl ChainStore for SqliteChainStore {
    fn append(&mut self, header: &Header, entry: &Entry) -> Result<Hash> {
        let hash = header.sum(&self.spec)?;
        let header_blob = rmp_serde::to_vec(header)?;
        let entry_blob = entry.marshal()?;
        self.db.execute(
            "INSERT INTO chain (header_hash, entry_hash, entry_type, header, entry)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                hash.to_b58(),
                header.entry_link.to_b58(),
                header.entry_type,
                header_blob,
                entry_blob
            ],
        )?;
        debug!(header = %hash, entry = %header.entry_link, "Appended to chain store");
        Ok(hash)
    }

    fn top(&self) -> Result<Option<Header>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT header FROM chain ORDER BY seq DESC LIMIT 1")?;
        let blob: Option<Vec<u8>> = stmt.query_row([], |row| row.get(0)).optional()?;
        match blob {
            Some(b) => Ok(Some(rmp_serde::from_slice(&b)?)),
            None => Ok(None),
        }
    }

    fn top_hash(&self) -> Result<Option<Hash>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT header_hash FROM chain ORDER BY seq DESC LIMIT 1")?;
        let result = stmt.query_row([], |row| row.get::<_, String>(0));
        match result {
            Ok(s) => Ok(Some(Hash::from_b58(&s)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn length(&self) -> Result<usize> {
        let n: i64 = self
            .db
            .query_row("SELECT count(*) FROM chain", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn get(&self, entry_hash: &Hash) -> Result<Option<(Entry, Header)>> {
        let mut stmt = self.db.prepare_cached(
            "SELECT header, entry FROM chain WHERE entry_hash = ?1 ORDER BY seq LIMIT 1",
        )?;
        let result = stmt.query_row([entry_hash.to_b58()], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
        });
        match result {
            Ok((h, e)) => {
                let (header, entry) = decode_row(h, e)?;
                Ok(Some((entry, header)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self) -> Result<Vec<(Header, Entry)>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT header, entry FROM chain ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (h, e) = row?;
            out.push(decode_row(h, e)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::Agent;
    use chrono::Utc;
    use tempfile::TempDir;

    fn header_for(agent: &Agent, spec: &HashSpec, prev: Hash, entry: &Entry) -> Header {
        Header::new(agent, Utc::now(), "oddNumbers", prev, entry.sum(spec).unwrap(), None)
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        let spec = HashSpec::default();
        let agent = Agent::generate("zippy");

        let e1 = Entry::text("3");
        let e2 = Entry::text("5");
        let (h1_hash, h2) = {
            let mut store = SqliteChainStore::open(dir.path(), spec).unwrap();
            assert_eq!(store.length().unwrap(), 0);
            assert!(store.top().unwrap().is_none());

            let h1 = header_for(&agent, &spec, Hash::null(), &e1);
            let h1_hash = store.append(&h1, &e1).unwrap();
            let h2 = header_for(&agent, &spec, h1_hash.clone(), &e2);
            store.append(&h2, &e2).unwrap();
            (h1_hash, h2)
        };

        let store = SqliteChainStore::open(dir.path(), spec).unwrap();
        assert_eq!(store.length().unwrap(), 2);
        assert_eq!(store.top().unwrap().unwrap(), h2);
        assert_eq!(store.top_hash().unwrap().unwrap(), h2.sum(&spec).unwrap());

        let (entry, header) = store.get(&e1.sum(&spec).unwrap()).unwrap().unwrap();
        assert_eq!(entry, e1);
        assert_eq!(header.sum(&spec).unwrap(), h1_hash);
        assert!(store.get(&Entry::text("7").sum(&spec).unwrap()).unwrap().is_none());

        let all = store.entries().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, e2);
    }

    #[test]
    fn test_binary_entries_roundtrip() {
        let spec = HashSpec::default();
        let agent = Agent::generate("zippy");
        let mut store = SqliteChainStore::open_in_memory(spec).unwrap();
        let e = Entry::bytes(vec![0u8, 1, 2, 255]);
        let h = header_for(&agent, &spec, Hash::null(), &e);
        store.append(&h, &e).unwrap();
        let (got, _) = store.get(&h.entry_link).unwrap().unwrap();
        assert_eq!(got, e);
    }
}
