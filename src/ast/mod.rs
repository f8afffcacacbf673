/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the syntax tree the checker walks
///
/// Submodules:
/// - ast: Node identities, the module root and operator kinds
/// - expressions: The closed set of expression kinds
/// - statements: The closed set of statement kinds and their parts
pub mod ast;
pub mod expressions;
pub mod statements;
