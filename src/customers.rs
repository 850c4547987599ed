use crate::errors::{Result, StoreError};
use crate::events::DomainEvent;
use crate::kv::{K_CUSTOMERS, KvStore};
use crate::models::{Customer, CustomerNote, User, new_id, now};

#[derive(Debug, Clone, Default)]
pub struct CustomerDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Per-advertiser customer records with append-only notes. Spend totals
/// accumulate through `apply_event`, never through direct calls from the
/// jobs store.
pub struct CustomersStore<'a> {
    kv: &'a KvStore,
}

impl<'a> CustomersStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn all(&self) -> Vec<Customer> {
        self.kv.get_as(K_CUSTOMERS).unwrap_or_default()
    }

    fn save(&self, customers: &[Customer]) -> Result<()> {
        self.kv.set_as(K_CUSTOMERS, &customers)
    }

    pub fn get(&self, id: &str) -> Option<Customer> {
        self.all().into_iter().find(|c| c.id == id)
    }

    pub fn mine(&self, user: &User) -> Vec<Customer> {
        self.all()
            .into_iter()
            .filter(|c| c.created_by == user.id)
            .collect()
    }

    pub fn add(&self, user: &User, draft: CustomerDraft) -> Result<Customer> {
        let customer = Customer {
            id: new_id(),
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            city: draft.city,
            notes: Vec::new(),
            total_spent: 0.0,
            total_jobs: 0,
            created_by: user.id.clone(),
            created_at: now(),
            updated_at: now(),
        };
        let mut customers = self.all();
        customers.push(customer.clone());
        self.save(&customers)?;
        Ok(customer)
    }

    pub fn update(&self, id: &str, mutate: impl FnOnce(&mut Customer)) -> Result<Customer> {
        let mut customers = self.all();
        let customer = customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("customer", id))?;
        mutate(customer);
        customer.updated_at = now();
        let updated = customer.clone();
        self.save(&customers)?;
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut customers = self.all();
        let before = customers.len();
        customers.retain(|c| c.id != id);
        if customers.len() == before {
            return Err(StoreError::not_found("customer", id));
        }
        self.save(&customers)
    }

    pub fn add_note(&self, id: &str, text: &str, author: &User) -> Result<Customer> {
        self.update(id, |customer| {
            customer.notes.push(CustomerNote {
                text: text.to_string(),
                created_at: now(),
                created_by: author.name.clone(),
            });
        })
    }

    /// Subscriber side of the jobs outbox: a posted job referencing a
    /// customer with positive advertiser value bumps that customer's
    /// aggregates. Anything else is ignored here.
    pub fn apply_event(&self, event: &DomainEvent) -> Result<()> {
        if let DomainEvent::JobPosted {
            customer_id: Some(customer_id),
            advertiser_value: Some(value),
            ..
        } = event
        {
            if *value > 0.0 && self.get(customer_id).is_some() {
                self.update(customer_id, |customer| {
                    customer.total_spent += value;
                    customer.total_jobs += 1;
                })?;
            }
        }
        Ok(())
    }
}
