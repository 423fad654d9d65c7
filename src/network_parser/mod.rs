pub mod network;

#[cfg(test)]
pub(crate) mod fake;
