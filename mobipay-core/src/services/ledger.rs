//! Ledger service - accounts, money movement and the commit protocol
//!
//! Balances live in the account store and history in the transaction store,
//! two separately persisted files. A balance-changing operation touches both,
//! so every such operation goes through [`LedgerService::commit`]:
//!
//! 1. write a commit intent (post-images + transaction) to the journal
//! 2. rewrite the account file
//! 3. rewrite the transaction file
//! 4. publish both in-memory snapshots under the publication gate
//! 5. clear the intent
//!
//! A failure in 2 or 3 restores the account file and clears the intent. A
//! crash anywhere after 1 leaves the intent behind; opening the ledger replays
//! it, so the operation ends up fully applied.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::IdentityVerifier;
use crate::adapters::{EncryptedSnapshotStore, Key, StoreOrigin};
use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountBook, CommitIntent, Journal, Outcome, Rejection, Role, Transaction,
    TransactionLog, TransactionType,
};

pub const ACCOUNTS_FILE: &str = "accounts.dat";
pub const TRANSACTIONS_FILE: &str = "transactions.dat";
pub const JOURNAL_FILE: &str = "journal.dat";

/// Store files, in the order they are listed by status and backup
pub static STORE_FILES: [&str; 3] = [ACCOUNTS_FILE, TRANSACTIONS_FILE, JOURNAL_FILE];

/// Fees burned on top of the moved amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    pub send_money: Decimal,
    pub cash_out: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            send_money: Decimal::new(300, 2),
            cash_out: Decimal::new(500, 2),
        }
    }
}

/// What opening the ledger had to repair
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryReport {
    /// Intent found in the journal and replayed
    pub replayed_intent: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    /// False when the transaction was already in the log
    pub transaction_appended: bool,
}

impl RecoveryReport {
    pub fn replayed(&self) -> bool {
        self.replayed_intent.is_some()
    }
}

/// Counts and totals over the whole ledger
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub accounts: usize,
    pub admins: usize,
    pub transactions: usize,
    pub total_balance: Decimal,
    pub fees_burned: Decimal,
}

/// Where a store's contents came from when the ledger was opened
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub kind: &'static str,
    pub file: String,
    #[serde(flatten)]
    pub origin: StoreOrigin,
}

pub struct LedgerService {
    accounts: EncryptedSnapshotStore<AccountBook>,
    transactions: EncryptedSnapshotStore<TransactionLog>,
    journal: EncryptedSnapshotStore<Journal>,
    identity: IdentityVerifier,
    fees: FeeSchedule,
    /// Held by every mutation from validation through publication
    commit_lock: Mutex<()>,
    /// Readers share it; publication of both stores takes it exclusively
    publish_gate: RwLock<()>,
    /// Set when an aborted commit could not be rolled back durably
    poisoned: AtomicBool,
    recovery: RecoveryReport,
}

impl LedgerService {
    /// Open the ledger in `dir`, replaying any interrupted commit
    pub fn open(dir: &Path, key: &Key, fees: FeeSchedule) -> Result<Self> {
        let service = Self::from_stores(
            EncryptedSnapshotStore::open(dir.join(ACCOUNTS_FILE), key.clone())?,
            EncryptedSnapshotStore::open(dir.join(TRANSACTIONS_FILE), key.clone())?,
            EncryptedSnapshotStore::open(dir.join(JOURNAL_FILE), key.clone())?,
            fees,
        );
        service.recover()
    }

    /// Open the ledger, moving any file that cannot be read with `key` aside
    ///
    /// Affected collections start empty. Only for deliberate use after the
    /// original key is known to be lost.
    pub fn open_discarding_unreadable(dir: &Path, key: &Key, fees: FeeSchedule) -> Result<Self> {
        let service = Self::from_stores(
            EncryptedSnapshotStore::open_discarding_unreadable(
                dir.join(ACCOUNTS_FILE),
                key.clone(),
            )?,
            EncryptedSnapshotStore::open_discarding_unreadable(
                dir.join(TRANSACTIONS_FILE),
                key.clone(),
            )?,
            EncryptedSnapshotStore::open_discarding_unreadable(
                dir.join(JOURNAL_FILE),
                key.clone(),
            )?,
            fees,
        );
        service.recover()
    }

    fn from_stores(
        accounts: EncryptedSnapshotStore<AccountBook>,
        transactions: EncryptedSnapshotStore<TransactionLog>,
        journal: EncryptedSnapshotStore<Journal>,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            accounts,
            transactions,
            journal,
            identity: IdentityVerifier::new(),
            fees,
            commit_lock: Mutex::new(()),
            publish_gate: RwLock::new(()),
            poisoned: AtomicBool::new(false),
            recovery: RecoveryReport::default(),
        }
    }

    /// Roll a pending intent forward: apply post-images, append the
    /// transaction if absent, ensure linkage, clear
    fn recover(mut self) -> Result<Self> {
        let Some(intent) = self.journal.read().pending else {
            return Ok(self);
        };
        eprintln!(
            "[mobipay] replaying interrupted commit {} (transaction {})",
            intent.id, intent.transaction.id
        );

        let mut book = self.accounts.read();
        for account in &intent.accounts {
            book.put(account.clone());
        }
        for phone in intent.transaction.account_refs() {
            match book.get_mut(phone) {
                Some(account) => account.link(intent.transaction.id),
                None => {
                    return Err(Error::integrity(format!(
                        "intent {} references unknown account {}",
                        intent.id, phone
                    )))
                }
            }
        }

        let mut log = self.transactions.read();
        let appended = !log.contains(&intent.transaction.id);
        if appended {
            log.append(intent.transaction.clone())?;
        }

        self.accounts.persist(&book)?;
        self.transactions.persist(&log)?;
        self.accounts.publish(book);
        self.transactions.publish(log);
        self.clear_intent()?;

        self.recovery = RecoveryReport {
            replayed_intent: Some(intent.id),
            transaction_id: Some(intent.transaction.id),
            transaction_appended: appended,
        };
        Ok(self)
    }

    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn fees(&self) -> FeeSchedule {
        self.fees
    }

    pub fn stores(&self) -> Vec<StoreInfo> {
        fn info(kind: &'static str, path: &Path, origin: &StoreOrigin) -> StoreInfo {
            StoreInfo {
                kind,
                file: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                origin: origin.clone(),
            }
        }
        vec![
            info("accounts", self.accounts.path(), self.accounts.origin()),
            info("transactions", self.transactions.path(), self.transactions.origin()),
            info("journal", self.journal.path(), self.journal.origin()),
        ]
    }

    /// True after a failed rollback; every mutation is refused until reopened
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    pub fn has_pending_intent(&self) -> bool {
        !self.journal.view(Journal::is_clear)
    }

    // ---- accounts ----

    /// Create a user account with a zero balance
    pub fn register(&self, phone: &str, name: &str, pin: &str) -> Result<Outcome<Account>> {
        self.register_with_role(phone, name, pin, Role::User)
    }

    pub fn register_with_role(
        &self,
        phone: &str,
        name: &str,
        pin: &str,
        role: Role,
    ) -> Result<Outcome<Account>> {
        let _commit = self.begin()?;
        if self.accounts.view(|book| book.contains(phone)) {
            return Ok(Rejection::AccountExists {
                phone: phone.to_string(),
            }
            .into());
        }

        let account = Account::new(phone, name, self.identity.hash(pin), role);
        self.accounts.mutate(|book| {
            book.put(account.clone());
            Ok(())
        })?;
        Ok(Outcome::Committed(account))
    }

    pub fn authenticate(&self, phone: &str, pin: &str) -> bool {
        let _gate = self.read_gate();
        self.accounts.view(|book| {
            book.get(phone)
                .is_some_and(|a| self.identity.verify(pin, &a.pin_hash))
        })
    }

    /// Authenticate and require the admin role
    pub fn authorize_admin(&self, phone: &str, pin: &str) -> Outcome<Account> {
        let _gate = self.read_gate();
        let Some(account) = self.accounts.view(|book| book.get(phone).cloned()) else {
            return Rejection::UnknownAccount {
                phone: phone.to_string(),
            }
            .into();
        };
        if !self.identity.verify(pin, &account.pin_hash) {
            return Rejection::WrongPin.into();
        }
        if !account.is_admin() {
            return Rejection::NotPermitted.into();
        }
        Outcome::Committed(account)
    }

    /// Replace the PIN hash; no transaction is recorded
    pub fn change_pin(&self, phone: &str, old_pin: &str, new_pin: &str) -> Result<Outcome<()>> {
        let _commit = self.begin()?;
        let Some(mut account) = self.account(phone) else {
            return Ok(unknown(phone));
        };
        if !self.identity.verify(old_pin, &account.pin_hash) {
            return Ok(Rejection::WrongPin.into());
        }

        account.pin_hash = self.identity.hash(new_pin);
        self.accounts.mutate(|book| {
            book.put(account);
            Ok(())
        })?;
        Ok(Outcome::Committed(()))
    }

    // ---- money movement ----

    /// Move `amount` between accounts; the sender also pays the send fee
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        pin: &str,
    ) -> Result<Outcome<Transaction>> {
        let _commit = self.begin()?;
        if let Some(rejection) = check_amount(amount) {
            return Ok(rejection.into());
        }
        if from == to {
            return Ok(Rejection::SelfTransfer.into());
        }
        let Some(mut sender) = self.account(from) else {
            return Ok(unknown(from));
        };
        let Some(mut recipient) = self.account(to) else {
            return Ok(unknown(to));
        };
        if !self.identity.verify(pin, &sender.pin_hash) {
            return Ok(Rejection::WrongPin.into());
        }
        let fee = self.fees.send_money;
        if let Err(rejection) = withdraw(&mut sender, amount, fee) {
            return Ok(rejection.into());
        }
        if let Err(rejection) = deposit(&mut recipient, amount) {
            return Ok(rejection.into());
        }

        let tx = Transaction::new(
            TransactionType::SendMoney,
            Some(from.to_string()),
            Some(to.to_string()),
            amount,
            "Send money",
        )
        .with_fee(fee);
        sender.link(tx.id);
        recipient.link(tx.id);

        self.commit(tx, vec![sender, recipient]).map(Outcome::Committed)
    }

    /// Withdraw through an agent; the account also pays the cash-out fee
    pub fn cash_out(
        &self,
        phone: &str,
        amount: Decimal,
        pin: &str,
    ) -> Result<Outcome<Transaction>> {
        let debit = Debit {
            tx_type: TransactionType::CashOut,
            counterparty: None,
            fee: self.fees.cash_out,
            description: "Cash out via agent",
        };
        self.debit(phone, amount, pin, debit)
    }

    /// Pay a merchant; `merchant` is not an account
    pub fn pay(
        &self,
        phone: &str,
        merchant: &str,
        amount: Decimal,
        pin: &str,
    ) -> Result<Outcome<Transaction>> {
        let debit = Debit {
            tx_type: TransactionType::Payment,
            counterparty: Some(merchant.to_string()),
            fee: Decimal::ZERO,
            description: "Payment to merchant",
        };
        self.debit(phone, amount, pin, debit)
    }

    /// Buy airtime for `target`, which is not an account
    pub fn recharge(
        &self,
        phone: &str,
        target: &str,
        amount: Decimal,
        pin: &str,
    ) -> Result<Outcome<Transaction>> {
        let debit = Debit {
            tx_type: TransactionType::Recharge,
            counterparty: Some(target.to_string()),
            fee: Decimal::ZERO,
            description: "Mobile recharge",
        };
        self.debit(phone, amount, pin, debit)
    }

    /// Credit money from outside the system
    pub fn top_up(&self, phone: &str, amount: Decimal, pin: &str) -> Result<Outcome<Transaction>> {
        let _commit = self.begin()?;
        if let Some(rejection) = check_amount(amount) {
            return Ok(rejection.into());
        }
        let Some(mut account) = self.account(phone) else {
            return Ok(unknown(phone));
        };
        if !self.identity.verify(pin, &account.pin_hash) {
            return Ok(Rejection::WrongPin.into());
        }
        if let Err(rejection) = deposit(&mut account, amount) {
            return Ok(rejection.into());
        }

        let tx = Transaction::new(
            TransactionType::Topup,
            None,
            Some(phone.to_string()),
            amount,
            "Add money via agent/bank",
        );
        account.link(tx.id);
        self.commit(tx, vec![account]).map(Outcome::Committed)
    }

    /// Single-account debit towards something outside the ledger
    fn debit(
        &self,
        phone: &str,
        amount: Decimal,
        pin: &str,
        debit: Debit,
    ) -> Result<Outcome<Transaction>> {
        let _commit = self.begin()?;
        if let Some(rejection) = check_amount(amount) {
            return Ok(rejection.into());
        }
        let Some(mut account) = self.account(phone) else {
            return Ok(unknown(phone));
        };
        if !self.identity.verify(pin, &account.pin_hash) {
            return Ok(Rejection::WrongPin.into());
        }
        if let Err(rejection) = withdraw(&mut account, amount, debit.fee) {
            return Ok(rejection.into());
        }

        let tx = Transaction::new(
            debit.tx_type,
            Some(phone.to_string()),
            debit.counterparty,
            amount,
            debit.description,
        )
        .with_fee(debit.fee);
        account.link(tx.id);
        self.commit(tx, vec![account]).map(Outcome::Committed)
    }

    // ---- queries ----

    pub fn balance_of(&self, phone: &str) -> Option<Decimal> {
        let _gate = self.read_gate();
        self.accounts.view(|book| book.get(phone).map(|a| a.balance))
    }

    pub fn account_details(&self, phone: &str) -> Option<Account> {
        let _gate = self.read_gate();
        self.account(phone)
    }

    /// Transactions linked to the account, in commit order; empty if unknown
    pub fn history(&self, phone: &str) -> Vec<Transaction> {
        let _gate = self.read_gate();
        let Some(ids) = self.accounts.view(|book| book.get(phone).map(|a| a.transactions.clone()))
        else {
            return Vec::new();
        };
        let mut history: Vec<Transaction> = self
            .transactions
            .view(|log| ids.iter().filter_map(|id| log.get(id).cloned()).collect());
        history.sort_by_key(|tx| tx.sequence);
        history
    }

    /// All accounts ordered by phone number
    pub fn accounts(&self) -> Vec<Account> {
        let _gate = self.read_gate();
        self.accounts.view(AccountBook::sorted)
    }

    /// The whole log in commit order
    pub fn transactions(&self) -> Vec<Transaction> {
        let _gate = self.read_gate();
        self.transactions.view(|log| log.iter().cloned().collect())
    }

    /// Both collections, from the same publication
    pub fn snapshot(&self) -> (AccountBook, TransactionLog) {
        let _gate = self.read_gate();
        (self.accounts.read(), self.transactions.read())
    }

    pub fn summary(&self) -> LedgerSummary {
        let (book, log) = self.snapshot();
        LedgerSummary {
            accounts: book.len(),
            admins: book.iter().filter(|a| a.is_admin()).count(),
            transactions: log.len(),
            total_balance: book.total_balance(),
            fees_burned: log.fees_burned(),
        }
    }

    // ---- commit protocol ----

    /// Take the commit lock and make sure the journal is clear
    fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        let guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_poisoned() {
            return Err(Error::persistence(
                "ledger refused the change: an earlier failed commit could not be rolled back; \
                 reopen the data directory to recover",
            ));
        }
        // Left over when clearing failed after a successful commit
        if self.has_pending_intent() {
            self.clear_intent()?;
        }
        Ok(guard)
    }

    fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.publish_gate.read().unwrap_or_else(|e| e.into_inner())
    }

    fn account(&self, phone: &str) -> Option<Account> {
        self.accounts.view(|book| book.get(phone).cloned())
    }

    /// Make `tx` and the staged account post-images durable and visible
    /// as one unit. Caller holds the commit lock.
    fn commit(&self, tx: Transaction, staged: Vec<Account>) -> Result<Transaction> {
        let mut book = self.accounts.read();
        for account in &staged {
            book.put(account.clone());
        }
        let mut log = self.transactions.read();
        let committed = log.append(tx)?.clone();

        self.journal.mutate(|journal| {
            journal.pending = Some(CommitIntent::new(committed.clone(), staged));
            Ok(())
        })?;

        if let Err(e) = self.accounts.persist(&book) {
            return Err(self.abort(false, e));
        }
        if let Err(e) = self.transactions.persist(&log) {
            return Err(self.abort(true, e));
        }

        {
            let _gate = self.publish_gate.write().unwrap_or_else(|e| e.into_inner());
            self.accounts.publish(book);
            self.transactions.publish(log);
        }

        if let Err(e) = self.clear_intent() {
            // Committed; the stale intent is cleared by the next mutation
            // or replayed idempotently on the next open.
            eprintln!(
                "[mobipay] transaction {} committed but the journal could not be cleared: {}",
                committed.id, e
            );
        }
        Ok(committed)
    }

    /// Undo a partially written commit; returns the error to report
    fn abort(&self, accounts_written: bool, cause: Error) -> Error {
        if accounts_written {
            let previous = self.accounts.read();
            if let Err(e) = self.accounts.persist(&previous) {
                self.poisoned.store(true, Ordering::SeqCst);
                return Error::persistence(format!(
                    "{}; restoring the account file also failed ({}); \
                     the operation will be completed when the ledger is reopened",
                    cause, e
                ));
            }
        }
        if let Err(e) = self.clear_intent() {
            self.poisoned.store(true, Ordering::SeqCst);
            return Error::persistence(format!(
                "{}; clearing the journal also failed ({}); \
                 the operation will be completed when the ledger is reopened",
                cause, e
            ));
        }
        cause
    }

    fn clear_intent(&self) -> Result<()> {
        self.journal.mutate(|journal| {
            journal.pending = None;
            Ok(())
        })
    }
}

fn unknown<T>(phone: &str) -> Outcome<T> {
    Rejection::UnknownAccount {
        phone: phone.to_string(),
    }
    .into()
}

/// Amounts are positive and whole in the smallest currency unit
/// What a single-account debit records besides who pays and how much
struct Debit {
    tx_type: TransactionType,
    counterparty: Option<String>,
    fee: Decimal,
    description: &'static str,
}

fn check_amount(amount: Decimal) -> Option<Rejection> {
    if amount <= Decimal::ZERO || amount.round_dp(2) != amount {
        Some(Rejection::InvalidAmount { amount })
    } else {
        None
    }
}

/// Take `amount + fee` from the account or refuse
fn withdraw(
    account: &mut Account,
    amount: Decimal,
    fee: Decimal,
) -> std::result::Result<(), Rejection> {
    let total = amount
        .checked_add(fee)
        .ok_or(Rejection::InvalidAmount { amount })?;
    if account.balance < total {
        return Err(Rejection::InsufficientFunds {
            required: total,
            available: account.balance,
        });
    }
    account.balance -= total;
    Ok(())
}

fn deposit(account: &mut Account, amount: Decimal) -> std::result::Result<(), Rejection> {
    account.balance = account
        .balance
        .checked_add(amount)
        .ok_or(Rejection::InvalidAmount { amount })?;
    Ok(())
}
