pub mod attr;
pub mod builder;
pub mod connections;
pub mod document;
pub mod error;
#[cfg(feature = "inspect")]
pub mod inspect;
pub mod model;
pub mod pg;

pub use builder::{BuildOptions, SchemaBuilder};
pub use document::Document;
pub use error::SchemaError;
pub use model::DbSchema;
pub use pg::{PgRenderer, default_type_table};

/// Compile schema notation sources straight to a PostgreSQL DDL
/// script, using the stock type table.
pub fn compile_to_ddl(sources: &[&str], options: BuildOptions) -> Result<String, SchemaError> {
    let mut builder = SchemaBuilder::with_options(options);
    for source in sources {
        builder.accumulate(&Document::from_yaml(source)?)?;
    }
    let schema = builder.finalize()?;

    let renderer = PgRenderer {
        restrict_types: Some(default_type_table()),
        ..PgRenderer::default()
    };
    renderer.render(&schema)
}
