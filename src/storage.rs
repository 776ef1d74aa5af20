//! Persistent preference cells in internal flash.
//!
//! The whole [`CellStore`] is serialised into one blob and kept under a
//! single key with `sequential-storage`, which handles wear levelling
//! and garbage collection across the reserved pages.

use crate::cells::{CellStore, MAX_BLOB_SIZE};
use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::error::Error;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key of the cell blob in the map storage.
const KEY_CELLS: u8 = 0x01;

/// Scratch buffer for one map item (key, length header and blob).
const ITEM_BUFFER_SIZE: usize = 64;

/// Replace the cache with what flash holds. A missing or unreadable
/// record leaves every cell erased, which the preference loader treats
/// as a fresh store.
pub async fn load(
    flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    cells: &mut CellStore,
) -> Result<(), Error> {
    let mut buf = [0u8; ITEM_BUFFER_SIZE];

    let result = sequential_storage::map::fetch_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_CELLS,
    )
    .await;

    *cells = CellStore::new();
    match result {
        Ok(Some(data)) => {
            cells.deserialize(data)?;
            info!("Loaded {} bytes of preferences from flash", data.len());
        }
        Ok(None) => info!("No preferences in flash"),
        Err(e) => {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            return Err(Error::Storage);
        }
    }
    cells.mark_clean();
    Ok(())
}

/// Write the cache back if it changed since the last load or save.
pub async fn save(
    flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    cells: &mut CellStore,
) -> Result<(), Error> {
    if !cells.is_dirty() {
        return Ok(());
    }

    let mut blob = [0u8; MAX_BLOB_SIZE];
    let len = cells.serialize(&mut blob)?;
    let item: &[u8] = &blob[..len];
    let mut buf = [0u8; ITEM_BUFFER_SIZE];

    match sequential_storage::map::store_item::<u8, &[u8], _>(
        flash,
        STORAGE_START..STORAGE_END,
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_CELLS,
        &item,
    )
    .await
    {
        Ok(()) => {
            debug!("Saved {} bytes of preferences", len);
            cells.mark_clean();
            Ok(())
        }
        Err(e) => {
            error!("Flash write error: {:?}", defmt::Debug2Format(&e));
            Err(Error::Storage)
        }
    }
}
