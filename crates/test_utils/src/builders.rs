//! Test Data Builders
//!
//! Builders for ledger records with sensible defaults. Tests set only the
//! fields they care about; names and emails default to `fake` values so
//! records created in one test never collide.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{AccountId, Currency, Money};
use domain_billing::{
    Account, Invoice, InvoiceStatus, LineItem, NewAccount, NewInvoice, NewTransaction, Transaction,
    TransactionType,
};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rust_decimal::Decimal;

use crate::fixtures::{IdFixtures, LineItemFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for accounts
pub struct TestAccountBuilder {
    name: String,
    email: String,
    phone: Option<String>,
    credit_limit: Option<Money>,
    balance: Money,
    created_at: DateTime<Utc>,
}

impl Default for TestAccountBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAccountBuilder {
    pub fn new() -> Self {
        Self {
            name: CompanyName().fake(),
            email: SafeEmail().fake(),
            phone: None,
            credit_limit: None,
            balance: MoneyFixtures::usd_zero(),
            created_at: TemporalFixtures::opened_at(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets a random phone number
    pub fn with_random_phone(mut self) -> Self {
        self.phone = Some(PhoneNumber().fake());
        self
    }

    pub fn with_credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Starting balance for accounts inserted directly into a store
    pub fn with_balance(mut self, balance: Money) -> Self {
        self.balance = balance;
        self
    }

    /// Builds the request accepted by `LedgerService::create_account`
    pub fn build_request(self) -> NewAccount {
        let mut request = NewAccount::new(self.name, self.email);
        if let Some(phone) = self.phone {
            request = request.with_phone(phone);
        }
        if let Some(limit) = self.credit_limit {
            request = request.with_credit_limit(limit);
        }
        request
    }

    /// Builds a stored account, bypassing the service
    pub fn build(self) -> Account {
        let balance = self.balance;
        let created_at = self.created_at;
        let mut account = self.build_request().into_account(balance.currency(), created_at);
        account.current_balance = balance;
        account
    }
}

/// Builder for invoices
pub struct TestInvoiceBuilder {
    account_id: AccountId,
    date: NaiveDate,
    due_date: Option<NaiveDate>,
    items: Vec<LineItem>,
    amount: Option<Money>,
    status: InvoiceStatus,
}

impl TestInvoiceBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            date: TemporalFixtures::today(),
            due_date: None,
            items: vec![LineItemFixtures::diesel()],
            amount: None,
            status: InvoiceStatus::Unpaid,
        }
    }

    /// An invoice whose single item and amount are both `amount`
    pub fn for_amount(account_id: AccountId, amount: Money) -> Self {
        Self::new(account_id)
            .with_items(vec![LineItemFixtures::single(amount)])
            .with_amount(amount)
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the due date `days` before the fixed test "today"
    pub fn due_days_ago(mut self, days: i64) -> Self {
        let due = TemporalFixtures::days_ago(days);
        if self.date > due {
            self.date = due;
        }
        self.due_date = Some(due);
        self
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    /// Overrides the frozen amount; defaults to the item subtotal
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn paid(mut self) -> Self {
        self.status = InvoiceStatus::Paid;
        self
    }

    /// Builds the request accepted by `LedgerService::create_invoice`
    pub fn build_request(self) -> NewInvoice {
        let currency = self
            .items
            .first()
            .map(|item| item.price.currency())
            .unwrap_or(Currency::USD);
        let amount = self.amount.unwrap_or_else(|| {
            self.items
                .iter()
                .map(LineItem::extended_price)
                .collect::<Result<Vec<_>, _>>()
                .and_then(|extended| Money::sum(currency, &extended))
                .unwrap_or_else(|_| Money::zero(currency))
        });
        NewInvoice {
            account_id: self.account_id,
            date: self.date,
            due_date: self.due_date.unwrap_or(self.date + chrono::Duration::days(15)),
            amount,
            items: self.items,
        }
    }

    /// Builds a stored invoice, bypassing the service
    pub fn build(self) -> Invoice {
        let status = self.status;
        let mut invoice = self.build_request().into_invoice();
        invoice.status = status;
        invoice
    }
}

/// Builder for transactions
pub struct TestTransactionBuilder {
    account_id: AccountId,
    date: NaiveDate,
    transaction_type: TransactionType,
    amount: Money,
    description: Option<String>,
}

impl Default for TestTransactionBuilder {
    fn default() -> Self {
        Self::new(IdFixtures::account_id())
    }
}

impl TestTransactionBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            date: TemporalFixtures::today(),
            transaction_type: TransactionType::Fuel,
            amount: MoneyFixtures::usd_fuel(),
            description: None,
        }
    }

    pub fn fuel(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id).with_type(TransactionType::Fuel).with_amount(amount)
    }

    pub fn store(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id).with_type(TransactionType::Store).with_amount(amount)
    }

    pub fn payment(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id).with_type(TransactionType::Payment).with_amount(amount)
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Sets the amount in the ledger's default currency
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Money::new(amount, Currency::USD);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builds the request accepted by `LedgerService::record_transaction`
    pub fn build_request(self) -> NewTransaction {
        let request = NewTransaction::new(self.account_id, self.date, self.transaction_type, self.amount);
        match self.description {
            Some(description) => request.with_description(description),
            None => request,
        }
    }

    pub fn build(self) -> Transaction {
        self.build_request().into_transaction()
    }
}
