use crate::embedding::ValueKind;
use std::collections::{BTreeMap, HashMap};

/// Handle to a value in the local arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Symbol(String),
    Object(BTreeMap<String, ValueId>),
    Function(String),
    External,
    BigInt(i64),
    Error {
        code: Option<String>,
        message: String,
    },
    Promise(usize),
}

impl LocalValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            LocalValue::Undefined => ValueKind::Undefined,
            LocalValue::Null => ValueKind::Null,
            LocalValue::Boolean(_) => ValueKind::Boolean,
            LocalValue::Number(_) => ValueKind::Number,
            LocalValue::String(_) => ValueKind::String,
            LocalValue::Symbol(_) => ValueKind::Symbol,
            LocalValue::Object(_) | LocalValue::Error { .. } | LocalValue::Promise(_) => {
                ValueKind::Object
            }
            LocalValue::Function(_) => ValueKind::Function,
            LocalValue::External => ValueKind::External,
            LocalValue::BigInt(_) => ValueKind::Unknown,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LocalValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(ValueId),
    Rejected(ValueId),
}

/// Value arena; entries live as long as the runtime
#[derive(Debug, Default)]
pub(super) struct Heap {
    values: Vec<LocalValue>,
    promises: Vec<PromiseState>,
    pub(super) references: HashMap<u64, ValueId>,
    next_reference: u64,
    pub(super) pending_exception: Option<ValueId>,
}

impl Heap {
    pub(super) fn alloc(&mut self, value: LocalValue) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }

    pub(super) fn get(&self, id: ValueId) -> Option<&LocalValue> {
        self.values.get(id.0)
    }

    pub(super) fn get_mut(&mut self, id: ValueId) -> Option<&mut LocalValue> {
        self.values.get_mut(id.0)
    }

    pub(super) fn new_promise(&mut self) -> (usize, ValueId) {
        self.promises.push(PromiseState::Pending);
        let index = self.promises.len() - 1;
        (index, self.alloc(LocalValue::Promise(index)))
    }

    pub(super) fn promise(&self, index: usize) -> PromiseState {
        self.promises
            .get(index)
            .copied()
            .unwrap_or(PromiseState::Pending)
    }

    /// Settle a pending promise; `false` if it was already settled
    pub(super) fn settle(&mut self, index: usize, state: PromiseState) -> bool {
        match self.promises.get_mut(index) {
            Some(slot) if *slot == PromiseState::Pending => {
                *slot = state;
                true
            }
            _ => false,
        }
    }

    pub(super) fn add_reference(&mut self, value: ValueId) -> u64 {
        self.next_reference += 1;
        self.references.insert(self.next_reference, value);
        self.next_reference
    }
}
