//! In-memory projection of the persisted ledger.
//!
//! The projection is loaded once from the store and then kept current by the
//! [`crate::Ledger`], which applies exactly the records it has just committed.
//! Writes never re-read it; [`crate::Ledger::reload`] and the balance audit
//! load a fresh copy on demand.

use std::collections::HashMap;

use common::{CustomerId, PaymentTermId, ProductId, TransactionId};
use record_store::RecordStore;

use crate::Result;
use crate::model::{Customer, PaymentTerm, Product, Record, Transaction};

/// Every entity of the ledger, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, Product>,
    transactions: HashMap<TransactionId, Transaction>,
    payment_terms: HashMap<PaymentTermId, PaymentTerm>,
}

async fn load_all<S, T>(store: &S) -> Result<Vec<T>>
where
    S: RecordStore + ?Sized,
    T: Record,
{
    let records = store.get_all(T::COLLECTION).await?;
    let decoded = records
        .iter()
        .map(T::from_envelope)
        .collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(decoded)
}

impl LedgerState {
    /// Reads every collection of `store` into a fresh projection.
    #[tracing::instrument(skip(store))]
    pub async fn load<S: RecordStore + ?Sized>(store: &S) -> Result<Self> {
        let customers = load_all::<_, Customer>(store).await?;
        let products = load_all::<_, Product>(store).await?;
        let transactions = load_all::<_, Transaction>(store).await?;
        let payment_terms = load_all::<_, PaymentTerm>(store).await?;

        tracing::debug!(
            customers = customers.len(),
            products = products.len(),
            transactions = transactions.len(),
            payment_terms = payment_terms.len(),
            "projection loaded"
        );

        Ok(Self {
            customers: customers.into_iter().map(|c| (c.id, c)).collect(),
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            transactions: transactions.into_iter().map(|t| (t.id, t)).collect(),
            payment_terms: payment_terms.into_iter().map(|t| (t.id, t)).collect(),
        })
    }

    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn payment_term(&self, id: PaymentTermId) -> Option<&PaymentTerm> {
        self.payment_terms.get(&id)
    }

    /// Customers, oldest first.
    pub fn customers(&self) -> Vec<Customer> {
        let mut customers: Vec<_> = self.customers.values().cloned().collect();
        customers.sort_by_key(|c| c.created_at);
        customers
    }

    /// Products by name, ignoring case.
    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<_> = self.products.values().cloned().collect();
        products.sort_by_cached_key(|p| p.name.to_lowercase());
        products
    }

    /// Transactions, newest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut transactions: Vec<_> = self.transactions.values().cloned().collect();
        sort_recent_first(&mut transactions);
        transactions
    }

    /// Payment terms, shortest first.
    pub fn payment_terms(&self) -> Vec<PaymentTerm> {
        let mut terms: Vec<_> = self.payment_terms.values().cloned().collect();
        terms.sort_by(|a, b| a.days.cmp(&b.days).then_with(|| a.name.cmp(&b.name)));
        terms
    }

    /// One customer's transactions, newest first.
    pub fn transactions_for(&self, customer_id: CustomerId) -> Vec<Transaction> {
        let mut transactions: Vec<_> = self
            .transactions
            .values()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect();
        sort_recent_first(&mut transactions);
        transactions
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    pub fn has_payment_terms(&self) -> bool {
        !self.payment_terms.is_empty()
    }

    pub(crate) fn customer_values(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub(crate) fn transaction_values(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    pub(crate) fn product_values(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub(crate) fn upsert_customer(&mut self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    /// Removes a customer and every transaction that references it.
    pub(crate) fn remove_customer(&mut self, id: CustomerId) {
        self.customers.remove(&id);
        self.transactions.retain(|_, t| t.customer_id != id);
    }

    pub(crate) fn upsert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub(crate) fn remove_product(&mut self, id: ProductId) {
        self.products.remove(&id);
    }

    pub(crate) fn insert_transaction(&mut self, transaction: Transaction) {
        self.transactions.insert(transaction.id, transaction);
    }

    pub(crate) fn remove_transaction(&mut self, id: TransactionId) {
        self.transactions.remove(&id);
    }

    pub(crate) fn insert_payment_term(&mut self, term: PaymentTerm) {
        self.payment_terms.insert(term.id, term);
    }
}

pub(crate) fn sort_recent_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
