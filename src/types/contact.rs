//! Emergency contacts

use serde::{Deserialize, Serialize};

use crate::MAX_CONTACTS;

/// One emergency contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: String,
    pub phone_number: String,
}

impl Contact {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
        }
    }

    /// Name if set, else the number
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.phone_number
        } else {
            &self.name
        }
    }
}

/// Ordered contact slots, each independently present or empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactList {
    slots: [Option<Contact>; MAX_CONTACTS],
}

impl ContactList {
    /// Create empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill slots in order from an iterator; extras beyond MAX_CONTACTS are ignored
    pub fn from_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let mut list = Self::new();
        for (slot, contact) in list.slots.iter_mut().zip(contacts) {
            *slot = Some(contact);
        }
        list
    }

    /// Slot by 0-based index
    pub fn get(&self, index: usize) -> Option<&Contact> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Set or clear a slot by 0-based index. Returns false if out of range.
    pub fn set(&mut self, index: usize, contact: Option<Contact>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = contact;
                true
            }
            None => false,
        }
    }

    /// Present contacts in slot order, skipping empty slots and blank numbers
    pub fn present(&self) -> impl Iterator<Item = &Contact> {
        self.slots
            .iter()
            .flatten()
            .filter(|c| !c.phone_number.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.present().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw slots, including empty ones
    pub fn slots(&self) -> &[Option<Contact>; MAX_CONTACTS] {
        &self.slots
    }
}
