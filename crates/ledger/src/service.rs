//! Ledger service providing the operations that read and change the ledger.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use common::{CustomerId, PaymentTermId, ProductId, TransactionId};
use record_store::schema::TRANSACTIONS_BY_CUSTOMER;
use record_store::{RecordStore, RecordStoreExt, StoreError, WriteBatch, WriteOp};
use tokio::sync::RwLock;

use crate::catalog::{COMMON_PRODUCTS, DEFAULT_PAYMENT_TERMS};
use crate::error::{EntityKind, LedgerError, Result, ensure_finite};
use crate::model::{
    Customer, CustomerUpdate, NewCustomer, NewPaymentTerm, NewProduct, NewTransaction,
    PaymentTerm, Product, ProductUpdate, Record, Transaction,
};
use crate::projection::LedgerState;
use crate::views::{self, BalanceDiscrepancy, CustomerStatement, LedgerSummary};

/// Service owning a record store and the in-memory projection of its contents.
///
/// Reads are served from the projection. Every write goes to the store first;
/// the projection is updated from the written values only once the store has
/// accepted them. Writes hold the projection's write lock for their whole
/// duration, so they never interleave.
///
/// Customer balances are only changed by [`Ledger::add_transaction`] and
/// [`Ledger::delete_transaction`], each of which commits the transaction
/// change and the balance change as one batch.
pub struct Ledger<S: RecordStore> {
    store: S,
    state: RwLock<LedgerState>,
}

impl<S: RecordStore> Ledger<S> {
    /// Opens a ledger over `store`, loading every stored record.
    #[tracing::instrument(skip(store))]
    pub async fn open(store: S) -> Result<Self> {
        let state = LedgerState::load(&store).await?;
        Ok(Self {
            store,
            state: RwLock::new(state),
        })
    }

    /// Returns a reference to the underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Discards the projection and loads it again from the store.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = LedgerState::load(&self.store).await?;
        tracing::info!("projection reloaded from store");
        Ok(())
    }

    async fn commit(&self, operation: &'static str, batch: WriteBatch) -> Result<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(source @ StoreError::PartialCommit { .. }) => {
                metrics::counter!("ledger_partial_commits_total", "operation" => operation)
                    .increment(1);
                tracing::error!(
                    operation,
                    error = %source,
                    "write left partially applied; audit balances to reconcile"
                );
                Err(LedgerError::PartialCommit { operation, source })
            }
            Err(e) => Err(LedgerError::Storage(e)),
        }
    }

    // Transactions

    /// Records a transaction and moves the customer's balance by its total.
    ///
    /// The new transaction and the updated customer are committed together.
    /// Fails with `NotFound` if the customer does not exist, and with a
    /// validation error if the new balance would not be a finite number. In
    /// either case nothing is written.
    #[tracing::instrument(
        skip(self, input),
        fields(customer_id = %input.customer_id, kind = %input.kind)
    )]
    pub async fn add_transaction(&self, input: NewTransaction) -> Result<Transaction> {
        input.validate()?;

        let mut state = self.state.write().await;
        let customer = state
            .customer(input.customer_id)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Customer, input.customer_id))?;

        let transaction = input.into_transaction(customer, Utc::now());
        let updated = customer.with_contribution(transaction.kind, transaction.total_amount);
        ensure_finite("customer balance", updated.balance)?;

        let batch = WriteBatch::new()
            .add(transaction.to_envelope()?)
            .put(updated.to_envelope()?);
        self.commit("add_transaction", batch).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            total = transaction.total_amount,
            balance = updated.balance,
            "transaction added"
        );
        metrics::counter!("ledger_transactions_added_total").increment(1);

        state.insert_transaction(transaction.clone());
        state.upsert_customer(updated);
        Ok(transaction)
    }

    /// Deletes a transaction and reverses its effect on the customer balance.
    ///
    /// Deleting an unknown id does nothing. If the owning customer no longer
    /// exists only the transaction is removed. A reversal that would push the
    /// balance out of the finite range is rejected before anything is written.
    #[tracing::instrument(skip(self))]
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(transaction) = state.transaction(id).cloned() else {
            tracing::warn!("delete of unknown transaction ignored");
            return Ok(());
        };

        let reversed = state
            .customer(transaction.customer_id)
            .map(|c| c.without_contribution(transaction.kind, transaction.total_amount));

        let mut batch = WriteBatch::new().delete(Transaction::COLLECTION, transaction.key());
        if let Some(customer) = &reversed {
            ensure_finite("customer balance", customer.balance)?;
            batch = batch.put(customer.to_envelope()?);
        }
        self.commit("delete_transaction", batch).await?;

        tracing::info!(
            customer_id = %transaction.customer_id,
            total = transaction.total_amount,
            balance = reversed.as_ref().map(|c| c.balance),
            "transaction deleted"
        );
        metrics::counter!("ledger_transactions_deleted_total").increment(1);

        state.remove_transaction(id);
        if let Some(customer) = reversed {
            state.upsert_customer(customer);
        }
        Ok(())
    }

    /// Lists every transaction, newest first.
    pub async fn list_transactions(&self) -> Vec<Transaction> {
        self.state.read().await.transactions()
    }

    /// Gets a transaction by id.
    pub async fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.state.read().await.transaction(id).cloned()
    }

    /// Lists one customer's transactions, newest first.
    pub async fn transactions_for_customer(&self, id: CustomerId) -> Vec<Transaction> {
        self.state.read().await.transactions_for(id)
    }

    // Customers

    /// Adds a customer with a zero balance.
    #[tracing::instrument(skip(self, input))]
    pub async fn add_customer(&self, input: NewCustomer) -> Result<Customer> {
        input.validate()?;

        let mut state = self.state.write().await;
        if let Some(term_id) = input.payment_term_id
            && state.payment_term(term_id).is_none()
        {
            return Err(LedgerError::not_found(EntityKind::PaymentTerm, term_id));
        }

        let customer = input.into_customer(Utc::now());
        self.store.add(customer.to_envelope()?).await?;

        tracing::info!(customer_id = %customer.id, "customer added");
        metrics::counter!("ledger_customers_added_total").increment(1);

        state.upsert_customer(customer.clone());
        Ok(customer)
    }

    /// Applies a partial edit to a customer's details.
    ///
    /// The balance is carried over unchanged, and transactions already
    /// recorded keep the customer name they were created with.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer> {
        let mut state = self.state.write().await;
        let existing = state
            .customer(id)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Customer, id))?;

        let updated = update.apply_to(existing)?;
        if let Some(term_id) = updated.payment_term_id
            && state.payment_term(term_id).is_none()
        {
            return Err(LedgerError::not_found(EntityKind::PaymentTerm, term_id));
        }

        self.store.put(updated.to_envelope()?).await?;
        tracing::info!("customer updated");

        state.upsert_customer(updated.clone());
        Ok(updated)
    }

    /// Deletes a customer together with all of its transactions.
    ///
    /// Balances are not touched: the customer record goes away with its
    /// history. Deleting an unknown id does nothing.
    #[tracing::instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let mut state = self.state.write().await;
        let key = id.to_string();

        let known = state.customer(id).is_some()
            || self.store.contains(Customer::COLLECTION, &key).await?;
        if !known {
            tracing::warn!("delete of unknown customer ignored");
            return Ok(());
        }

        let mut owned: BTreeSet<String> = self
            .store
            .get_all_by_index(Transaction::COLLECTION, TRANSACTIONS_BY_CUSTOMER.name, &key)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        owned.extend(state.transactions_for(id).iter().map(Record::key));

        let mut batch = WriteBatch::new().delete(Customer::COLLECTION, key);
        for transaction_id in &owned {
            batch = batch.delete(Transaction::COLLECTION, transaction_id.as_str());
        }
        self.commit("delete_customer", batch).await?;

        tracing::info!(transactions = owned.len(), "customer deleted");
        metrics::counter!("ledger_customers_deleted_total").increment(1);

        state.remove_customer(id);
        Ok(())
    }

    /// Lists customers, oldest first.
    pub async fn list_customers(&self) -> Vec<Customer> {
        self.state.read().await.customers()
    }

    /// Gets a customer by id.
    pub async fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.state.read().await.customer(id).cloned()
    }

    // Products

    #[tracing::instrument(skip(self, input))]
    pub async fn add_product(&self, input: NewProduct) -> Result<Product> {
        input.validate()?;

        let mut state = self.state.write().await;
        let product = input.into_product(Utc::now());
        self.store.add(product.to_envelope()?).await?;
        tracing::info!(product_id = %product.id, "product added");

        state.upsert_product(product.clone());
        Ok(product)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut state = self.state.write().await;
        let existing = state
            .product(id)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Product, id))?;

        let updated = update.apply_to(existing)?;
        self.store.put(updated.to_envelope()?).await?;
        tracing::info!("product updated");

        state.upsert_product(updated.clone());
        Ok(updated)
    }

    /// Deletes a product. Deleting an unknown id does nothing.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        let key = id.to_string();

        let known = state.product(id).is_some()
            || self.store.contains(Product::COLLECTION, &key).await?;
        if !known {
            tracing::warn!("delete of unknown product ignored");
            return Ok(());
        }

        self.store.delete(Product::COLLECTION, &key).await?;
        tracing::info!("product deleted");

        state.remove_product(id);
        Ok(())
    }

    /// Lists products by name, ignoring case.
    pub async fn list_products(&self) -> Vec<Product> {
        self.state.read().await.products()
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.read().await.product(id).cloned()
    }

    /// Adds every staple from [`COMMON_PRODUCTS`] whose name is not in the
    /// catalog yet. Returns how many were added.
    #[tracing::instrument(skip(self))]
    pub async fn add_common_products(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        let present: HashSet<String> = state
            .product_values()
            .map(|p| p.name.to_lowercase())
            .collect();

        let now = Utc::now();
        let products: Vec<Product> = COMMON_PRODUCTS
            .iter()
            .filter(|staple| !present.contains(&staple.name.to_lowercase()))
            .map(|staple| {
                NewProduct::new(staple.name, staple.category, staple.unit, staple.price)
                    .into_product(now)
            })
            .collect();

        if products.is_empty() {
            return Ok(0);
        }

        let batch = products
            .iter()
            .map(|p| p.to_envelope().map(WriteOp::Add))
            .collect::<std::result::Result<WriteBatch, _>>()?;
        self.commit("add_common_products", batch).await?;

        let added = products.len();
        tracing::info!(added, "common products added");
        for product in products {
            state.upsert_product(product);
        }
        Ok(added)
    }

    // Payment terms

    #[tracing::instrument(skip(self, input))]
    pub async fn add_payment_term(&self, input: NewPaymentTerm) -> Result<PaymentTerm> {
        input.validate()?;

        let mut state = self.state.write().await;
        let term = input.into_term();
        self.store.add(term.to_envelope()?).await?;
        tracing::info!(payment_term_id = %term.id, days = term.days, "payment term added");

        state.insert_payment_term(term.clone());
        Ok(term)
    }

    /// Seeds [`DEFAULT_PAYMENT_TERMS`] when the ledger has no payment terms.
    /// Returns how many were added.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_default_payment_terms(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.has_payment_terms() {
            return Ok(0);
        }

        let terms: Vec<PaymentTerm> = DEFAULT_PAYMENT_TERMS
            .iter()
            .map(|&(name, days)| NewPaymentTerm::new(name, days).into_term())
            .collect();
        let batch = terms
            .iter()
            .map(|t| t.to_envelope().map(WriteOp::Add))
            .collect::<std::result::Result<WriteBatch, _>>()?;
        self.commit("ensure_default_payment_terms", batch).await?;

        let added = terms.len();
        tracing::info!(added, "default payment terms added");
        for term in terms {
            state.insert_payment_term(term);
        }
        Ok(added)
    }

    /// Lists payment terms, shortest first.
    pub async fn list_payment_terms(&self) -> Vec<PaymentTerm> {
        self.state.read().await.payment_terms()
    }

    pub async fn payment_term(&self, id: PaymentTermId) -> Option<PaymentTerm> {
        self.state.read().await.payment_term(id).cloned()
    }

    // Views

    /// Business-wide totals, recent activity and top balances.
    pub async fn summary(&self) -> LedgerSummary {
        LedgerSummary::from_state(&*self.state.read().await)
    }

    /// A customer's transactions with debit and credit totals.
    pub async fn statement(&self, customer_id: CustomerId) -> Result<CustomerStatement> {
        let state = self.state.read().await;
        let customer = state
            .customer(customer_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::Customer, customer_id))?;
        Ok(CustomerStatement::new(
            customer,
            state.transactions_for(customer_id),
        ))
    }

    /// Compares every stored customer balance with the signed sum of the
    /// customer's stored transactions.
    ///
    /// Reads the store directly rather than the projection, so it also sees
    /// the effect of a partially committed write. Changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn audit_balances(&self) -> Result<Vec<BalanceDiscrepancy>> {
        let _writes_paused = self.state.read().await;
        let persisted = LedgerState::load(&self.store).await?;

        let discrepancies = views::audit(&persisted);
        if discrepancies.is_empty() {
            tracing::info!("all balances consistent");
        } else {
            tracing::warn!(count = discrepancies.len(), "balance discrepancies found");
        }
        Ok(discrepancies)
    }
}
