//! Commit protocol under failure: rejected writes, crashes, replay
//!
//! Write failures are injected by putting a non-empty directory where a
//! store file should be, which makes the final rename fail. Crashes are
//! simulated by writing the journal and store files directly, the way an
//! interrupted commit would have left them.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use tempfile::TempDir;

use mobipay_core::adapters::crypto::{derive_key, Key};
use mobipay_core::adapters::EncryptedSnapshotStore;
use mobipay_core::domain::{
    AccountBook, CommitIntent, Journal, Transaction, TransactionLog, TransactionType,
};
use mobipay_core::services::ledger::{ACCOUNTS_FILE, JOURNAL_FILE, TRANSACTIONS_FILE};
use mobipay_core::services::{FeeSchedule, LedgerService};
use mobipay_core::Error;

fn key() -> Key {
    derive_key(b"recovery-test")
}

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn open(dir: &Path) -> LedgerService {
    LedgerService::open(dir, &key(), FeeSchedule::default()).unwrap()
}

/// A and B registered, A topped up with 100
fn seeded() -> TempDir {
    let dir = TempDir::new().unwrap();
    let ledger = open(dir.path());
    ledger.register("A", "Alice", "1111").unwrap();
    ledger.register("B", "Bob", "2222").unwrap();
    ledger.top_up("A", d("100"), "1111").unwrap();
    dir
}

/// Swap a store file for a directory so its next rewrite fails
struct Squat {
    target: std::path::PathBuf,
    aside: std::path::PathBuf,
}

impl Squat {
    fn new(dir: &Path, file: &str) -> Self {
        let target = dir.join(file);
        let aside = dir.join(format!("{}.aside", file));
        fs::rename(&target, &aside).unwrap();
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();
        Self { target, aside }
    }

    fn release(self) {
        fs::remove_dir_all(&self.target).unwrap();
        fs::rename(&self.aside, &self.target).unwrap();
    }
}

#[test]
fn test_failed_log_write_rolls_back_everything() {
    let dir = seeded();
    let ledger = open(dir.path());

    let squat = Squat::new(dir.path(), TRANSACTIONS_FILE);
    let err = ledger.transfer("A", "B", d("10"), "1111").unwrap_err();
    assert!(matches!(err, Error::Persistence(_)), "{}", err);

    // Nothing published
    assert_eq!(ledger.balance_of("A"), Some(d("100")));
    assert_eq!(ledger.balance_of("B"), Some(Decimal::ZERO));
    assert_eq!(ledger.transactions().len(), 1);
    assert_eq!(ledger.history("A").len(), 1);
    assert!(ledger.history("B").is_empty());
    assert!(!ledger.has_pending_intent());
    assert!(!ledger.is_poisoned());
    squat.release();

    // The account file was put back as well
    drop(ledger);
    let reopened = open(dir.path());
    assert!(!reopened.recovery().replayed());
    assert_eq!(reopened.balance_of("A"), Some(d("100")));
    assert_eq!(reopened.balance_of("B"), Some(Decimal::ZERO));
    assert_eq!(reopened.account_details("A").unwrap().transactions.len(), 1);
}

#[test]
fn test_ledger_keeps_working_after_failed_write() {
    let dir = seeded();
    let ledger = open(dir.path());

    let squat = Squat::new(dir.path(), ACCOUNTS_FILE);
    assert!(ledger.cash_out("A", d("10"), "1111").is_err());
    squat.release();

    let tx = ledger
        .transfer("A", "B", d("10"), "1111")
        .unwrap()
        .into_committed()
        .unwrap();
    assert_eq!(tx.sequence, 2);
    assert_eq!(ledger.balance_of("A"), Some(d("87")));

    drop(ledger);
    let reopened = open(dir.path());
    assert_eq!(reopened.balance_of("A"), Some(d("87")));
    assert_eq!(reopened.balance_of("B"), Some(d("10")));
    assert_eq!(reopened.transactions().len(), 2);
}

#[test]
fn test_failed_journal_write_changes_nothing() {
    let dir = seeded();
    let ledger = open(dir.path());

    let journal = dir.path().join(JOURNAL_FILE);
    fs::remove_file(&journal).ok();
    fs::create_dir(&journal).unwrap();
    fs::write(journal.join("occupied"), b"x").unwrap();

    assert!(matches!(
        ledger.pay("A", "shop", d("1"), "1111"),
        Err(Error::Persistence(_))
    ));
    assert_eq!(ledger.balance_of("A"), Some(d("100")));
    assert_eq!(ledger.transactions().len(), 1);
}

/// Stage a send of 10 from A to B exactly as a commit would, returning the
/// transaction and the post-image account book
fn stage_send(dir: &Path) -> (Transaction, AccountBook) {
    let accounts: EncryptedSnapshotStore<AccountBook> =
        EncryptedSnapshotStore::open(dir.join(ACCOUNTS_FILE), key()).unwrap();
    let transactions: EncryptedSnapshotStore<TransactionLog> =
        EncryptedSnapshotStore::open(dir.join(TRANSACTIONS_FILE), key()).unwrap();

    let tx = Transaction::new(
        TransactionType::SendMoney,
        Some("A".into()),
        Some("B".into()),
        d("10"),
        "Send money",
    )
    .with_fee(d("3"));
    let mut log = transactions.read();
    let tx = log.append(tx).unwrap().clone();

    let mut book = accounts.read();
    let mut a = book.get("A").unwrap().clone();
    a.balance -= d("13");
    a.link(tx.id);
    let mut b = book.get("B").unwrap().clone();
    b.balance += d("10");
    b.link(tx.id);
    book.put(a);
    book.put(b);
    (tx, book)
}

fn write_intent(dir: &Path, tx: &Transaction, book: &AccountBook) {
    let journal: EncryptedSnapshotStore<Journal> =
        EncryptedSnapshotStore::open(dir.join(JOURNAL_FILE), key()).unwrap();
    let images = vec![
        book.get("A").unwrap().clone(),
        book.get("B").unwrap().clone(),
    ];
    journal
        .persist(&Journal {
            pending: Some(CommitIntent::new(tx.clone(), images)),
        })
        .unwrap();
}

fn assert_send_applied_once(dir: &Path, tx: &Transaction) {
    let ledger = open(dir);
    assert_eq!(ledger.balance_of("A"), Some(d("87")));
    assert_eq!(ledger.balance_of("B"), Some(d("10")));
    let log = ledger.transactions();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].id, tx.id);
    assert_eq!(log[1].sequence, 2);
    assert!(ledger.history("B").iter().any(|t| t.id == tx.id));
    assert!(!ledger.has_pending_intent());
}

#[test]
fn test_crash_after_intent_is_rolled_forward() {
    let dir = seeded();
    let (tx, book) = stage_send(dir.path());
    write_intent(dir.path(), &tx, &book);

    {
        let ledger = open(dir.path());
        let report = ledger.recovery();
        assert_eq!(report.transaction_id, Some(tx.id));
        assert!(report.transaction_appended);
    }
    assert_send_applied_once(dir.path(), &tx);
}

#[test]
fn test_crash_between_store_writes_is_rolled_forward() {
    let dir = seeded();
    let (tx, book) = stage_send(dir.path());
    write_intent(dir.path(), &tx, &book);

    // Account file already rewritten, log not yet
    let accounts: EncryptedSnapshotStore<AccountBook> =
        EncryptedSnapshotStore::open(dir.path().join(ACCOUNTS_FILE), key()).unwrap();
    accounts.persist(&book).unwrap();
    drop(accounts);

    {
        let ledger = open(dir.path());
        assert!(ledger.recovery().replayed());
    }
    assert_send_applied_once(dir.path(), &tx);
    // Second open finds nothing to do
    assert!(!open(dir.path()).recovery().replayed());
}

#[test]
fn test_crash_before_journal_clear_does_not_duplicate() {
    let dir = seeded();
    let (tx, book) = stage_send(dir.path());
    write_intent(dir.path(), &tx, &book);

    let accounts: EncryptedSnapshotStore<AccountBook> =
        EncryptedSnapshotStore::open(dir.path().join(ACCOUNTS_FILE), key()).unwrap();
    accounts.persist(&book).unwrap();
    let transactions: EncryptedSnapshotStore<TransactionLog> =
        EncryptedSnapshotStore::open(dir.path().join(TRANSACTIONS_FILE), key()).unwrap();
    let mut log = transactions.read();
    log.append(tx.clone()).unwrap();
    transactions.persist(&log).unwrap();
    drop((accounts, transactions));

    {
        let ledger = open(dir.path());
        assert!(ledger.recovery().replayed());
        assert!(!ledger.recovery().transaction_appended);
    }
    assert_send_applied_once(dir.path(), &tx);
}

#[test]
fn test_stray_temp_files_are_ignored() {
    let dir = seeded();
    fs::write(dir.path().join(".accounts.dat.XyZ123.tmp"), b"half a snapshot").unwrap();
    fs::write(dir.path().join(".transactions.dat.AbC456.tmp"), b"").unwrap();

    let ledger = open(dir.path());
    assert_eq!(ledger.balance_of("A"), Some(d("100")));
    assert_eq!(ledger.transactions().len(), 1);
}

#[test]
fn test_tampered_log_refuses_to_open() {
    let dir = seeded();
    let path = dir.path().join(TRANSACTIONS_FILE);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&path, bytes).unwrap();

    let err = LedgerService::open(dir.path(), &key(), FeeSchedule::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Authentication(_)));
}
