pub mod backing;
pub mod checked;
pub mod ledger;
pub mod policy;

#[cfg(test)]
pub(crate) mod testhook;
