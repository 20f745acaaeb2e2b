//! Typed columns over the versioned store.
//!
//! Every key is a one byte column tag followed by the column key; every
//! value is bincode.

use {
    log::*,
    serde::{de::DeserializeOwned, Serialize},
    strata_sdk::{
        account::{Account, Permission},
        block::{Block, BlockId},
        hash::Hash,
        pubkey::Pubkey,
        receipt::Receipt,
        transaction::{Transaction, TransactionId},
    },
    strata_versioned_store::{Key, KeyValueRead, KeyValueWrite},
};

/// Number of slots in the recent block ring used as Tapos anchors.
pub const RECENT_BLOCKS_SIZE: u64 = 1 << 16;

const HEAD_STATE_PROPERTY: &[u8] = b"head_state";

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Accounts = 0,
    Blocks = 1,
    BlockIndex = 2,
    Transactions = 3,
    RecentBlocks = 4,
    Properties = 5,
}

impl Column {
    pub fn key(self, key: &[u8]) -> Key {
        let mut full_key = Vec::with_capacity(1 + key.len());
        full_key.push(self as u8);
        full_key.extend_from_slice(key);
        full_key
    }
}

/// Chain head as recorded by the last applied block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadState {
    pub head: BlockId,
    /// Timestamp of the head block.
    pub timestamp: u64,
    pub last_irreversible: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub receipt: Receipt,
    pub block_number: u64,
}

fn read<R, T>(reader: &R, key: &[u8]) -> Option<T>
where
    R: KeyValueRead + ?Sized,
    T: DeserializeOwned,
{
    let bytes = reader.get(key)?;
    bincode::deserialize(&bytes)
        .map_err(|err| error!("undecodable value under column {}: {}", key[0], err))
        .ok()
}

fn write<W, T>(writer: &mut W, key: Key, value: &T)
where
    W: KeyValueWrite + ?Sized,
    T: Serialize,
{
    writer.put(key, bincode::serialize(value).unwrap());
}

pub fn get_account<R: KeyValueRead + ?Sized>(reader: &R, address: &Pubkey) -> Option<Account> {
    read(reader, &Column::Accounts.key(address.as_ref()))
}

pub fn put_account<W: KeyValueWrite + ?Sized>(writer: &mut W, address: &Pubkey, account: &Account) {
    write(writer, Column::Accounts.key(address.as_ref()), account)
}

/// The permission signatures of `owner` are checked against. Addresses
/// without an account or an explicit permission sign with their own key.
pub fn owner_permission<R: KeyValueRead + ?Sized>(reader: &R, owner: &Pubkey) -> Permission {
    get_account(reader, owner)
        .map(|account| account.permission(owner))
        .unwrap_or_else(|| Permission::single(*owner))
}

/// Adds `amount` to the balance of `address`, creating the account if needed.
pub fn credit_account<W: KeyValueWrite + ?Sized>(writer: &mut W, address: &Pubkey, amount: u64) {
    let mut account = get_account(&*writer, address).unwrap_or_default();
    account.balance = account.balance.saturating_add(amount);
    put_account(writer, address, &account);
}

pub fn get_block<R: KeyValueRead + ?Sized>(reader: &R, hash: &Hash) -> Option<Block> {
    read(reader, &Column::Blocks.key(hash.as_ref()))
}

pub fn has_block<R: KeyValueRead + ?Sized>(reader: &R, hash: &Hash) -> bool {
    reader.contains(&Column::Blocks.key(hash.as_ref()))
}

pub fn put_block<W: KeyValueWrite + ?Sized>(writer: &mut W, block: &Block) {
    write(writer, Column::Blocks.key(block.id().hash.as_ref()), block)
}

pub fn get_block_id<R: KeyValueRead + ?Sized>(reader: &R, number: u64) -> Option<BlockId> {
    read(reader, &Column::BlockIndex.key(&number.to_be_bytes()))
}

pub fn put_block_id<W: KeyValueWrite + ?Sized>(writer: &mut W, id: &BlockId) {
    write(writer, Column::BlockIndex.key(&id.number.to_be_bytes()), id)
}

pub fn get_transaction_record<R: KeyValueRead + ?Sized>(
    reader: &R,
    id: &TransactionId,
) -> Option<TransactionRecord> {
    read(reader, &Column::Transactions.key(id.as_ref()))
}

pub fn has_transaction<R: KeyValueRead + ?Sized>(reader: &R, id: &TransactionId) -> bool {
    reader.contains(&Column::Transactions.key(id.as_ref()))
}

pub fn put_transaction_record<W: KeyValueWrite + ?Sized>(writer: &mut W, record: &TransactionRecord) {
    write(
        writer,
        Column::Transactions.key(record.transaction.id().as_ref()),
        record,
    )
}

fn recent_block_key(number: u64) -> Key {
    let slot = (number % RECENT_BLOCKS_SIZE) as u16;
    Column::RecentBlocks.key(&slot.to_be_bytes())
}

/// The block recorded in the ring slot of `number`. The slot may hold a
/// block 65 536 heights away; callers compare the full id.
pub fn get_recent_block<R: KeyValueRead + ?Sized>(reader: &R, number: u64) -> Option<BlockId> {
    read(reader, &recent_block_key(number))
}

pub fn put_recent_block<W: KeyValueWrite + ?Sized>(writer: &mut W, id: &BlockId) {
    write(writer, recent_block_key(id.number), id)
}

pub fn get_head_state<R: KeyValueRead + ?Sized>(reader: &R) -> Option<HeadState> {
    read(reader, &Column::Properties.key(HEAD_STATE_PROPERTY))
}

pub fn put_head_state<W: KeyValueWrite + ?Sized>(writer: &mut W, head_state: &HeadState) {
    write(writer, Column::Properties.key(HEAD_STATE_PROPERTY), head_state)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::Arc,
        strata_versioned_store::{FlushPolicy, MemoryBackend, VersionedStore},
    };

    #[test]
    fn test_columns_do_not_collide() {
        let key = [7u8; 32];
        assert_ne!(Column::Accounts.key(&key), Column::Blocks.key(&key));
        assert_eq!(Column::Transactions.key(&key)[0], 3);
        assert_eq!(Column::Properties.key(&key).len(), 33);
    }

    #[test]
    fn test_recent_block_ring_wraps() {
        let (store, mut token) =
            VersionedStore::open(Arc::new(MemoryBackend::new()), FlushPolicy::default()).unwrap();
        let mut session = store.build_session(&mut token).unwrap();
        let old = BlockId::new(5, Hash::new_unique());
        put_recent_block(&mut session, &old);
        assert_eq!(get_recent_block(&session, 5), Some(old));

        let new = BlockId::new(5 + RECENT_BLOCKS_SIZE, Hash::new_unique());
        put_recent_block(&mut session, &new);
        // same slot, so the old anchor is gone
        assert_eq!(get_recent_block(&session, 5), Some(new));
    }

    #[test]
    fn test_typed_round_trip_through_session() {
        let (store, mut token) =
            VersionedStore::open(Arc::new(MemoryBackend::new()), FlushPolicy::default()).unwrap();
        let address = Pubkey::new_unique();
        let head = HeadState {
            head: BlockId::new(100, Hash::new_unique()),
            timestamp: 300_000,
            last_irreversible: 98,
        };
        let mut session = store.build_session(&mut token).unwrap();
        put_account(&mut session, &address, &Account::new(40));
        credit_account(&mut session, &address, 2);
        put_head_state(&mut session, &head);
        session.commit().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(get_account(&snapshot, &address), Some(Account::new(42)));
        assert_eq!(get_account(&snapshot, &Pubkey::new_unique()), None);
        assert_eq!(get_head_state(&snapshot), Some(head));
        assert!(get_block_id(&snapshot, 100).is_none());
    }
}
