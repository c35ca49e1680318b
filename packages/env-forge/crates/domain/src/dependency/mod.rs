pub mod removal_dag;

pub use removal_dag::{GraphError, RemovalDag};
