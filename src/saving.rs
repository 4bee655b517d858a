use bincode::{deserialize_from, serialize_into};
use chrono::{DateTime, Duration, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::cart::Cart;
use crate::database::StoreError;

pub const GUESTS_DIR: &str = "guests";

/// Guest carts untouched for this long are pruned when the store opens.
pub const DEFAULT_GUEST_CART_DAYS: i64 = 30;

/// The `guests/` directory of a data directory.
///
/// Every load, update and adoption holds one lock, so concurrent requests
/// from the same guest see each other's changes.
pub struct GuestCarts {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl GuestCarts {
    /// Create the directory if needed and drop carts older than `max_age`.
    pub fn open(data_dir: &Path, max_age: Duration) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir.join(GUESTS_DIR))?;

        let carts = GuestCarts {
            data_dir: data_dir.to_path_buf(),
            lock: Mutex::new(()),
        };

        let pruned = carts.prune(Utc::now() - max_age)?;
        if pruned > 0 {
            info!("Pruned {pruned} abandoned guest carts");
        }

        Ok(carts)
    }

    pub fn path(&self, guest_id: Uuid) -> PathBuf {
        guest_cart_path(&self.data_dir, guest_id)
    }

    pub fn load(&self, guest_id: Uuid) -> Result<Cart, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        load_guest_cart(&self.path(guest_id))
    }

    /// Load, change and save a guest cart. Nothing is saved if `f` fails.
    pub fn update<R, E>(
        &self,
        guest_id: Uuid,
        f: impl FnOnce(&mut Cart) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path(guest_id);

        let mut cart = load_guest_cart(&path)?;
        let result = f(&mut cart)?;
        save_guest_cart(&cart, &path)?;

        Ok(result)
    }

    /// Hand a guest cart over to `adopt`. The file is deleted only once
    /// `adopt` succeeds.
    pub fn adopt<R, E>(
        &self,
        guest_id: Uuid,
        adopt: impl FnOnce(Cart) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path(guest_id);

        let cart = load_guest_cart(&path)?;
        let result = adopt(cart)?;
        remove_guest_cart(&path)?;

        Ok(result)
    }

    /// Delete carts last written before `cutoff`. Returns how many went.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pruned = 0;

        for entry in fs::read_dir(self.data_dir.join(GUESTS_DIR))? {
            let entry = entry?;
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) => {
                    warn!("Skipping {}: {e}", entry.path().display());
                    continue;
                }
            };

            if modified < cutoff && entry.file_type()?.is_file() {
                remove_guest_cart(&entry.path())?;
                pruned += 1;
            }
        }

        Ok(pruned)
    }
}

/// Where a guest's cart lives under the data directory.
///
/// Taking a [`Uuid`] keeps cookie values from reaching the filesystem as
/// arbitrary paths.
pub fn guest_cart_path(data_dir: &Path, guest_id: Uuid) -> PathBuf {
    data_dir
        .join(GUESTS_DIR)
        .join(format!("{}.bin.gz", guest_id.simple()))
}

/// Write a guest cart next to its final path, then move it into place.
pub fn save_guest_cart(cart: &Cart, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("gz.tmp");
    let file = File::create(&tmp)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, cart)?;

    let encoder = writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))?;
    encoder.finish()?.flush()?;

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a guest cart. A guest without a saved cart has an empty one.
pub fn load_guest_cart(path: &Path) -> Result<Cart, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Cart::default()),
        Err(e) => return Err(e.into()),
    };

    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    Ok(deserialize_from(&mut reader)?)
}

pub fn remove_guest_cart(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
