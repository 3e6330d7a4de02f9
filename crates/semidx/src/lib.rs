pub mod ast;
pub mod extract;
pub mod infer;
pub mod output;
pub mod session;
pub mod symbols;

#[cfg(test)]
mod tests;
