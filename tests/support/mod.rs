#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use brick_mason::{Schema, SchemaConfig, SchemaIntrospector, Session};
use oxigraph::model::NamedNode;
use tempfile::{TempDir, tempdir};

pub const BRICK: &str = "https://brickschema.org/schema/Brick#";
pub const UNIT: &str = "http://qudt.org/vocab/unit/";
pub const BLDG: &str = "urn:bldg#";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The mini Brick ontology with the units feed loaded into the same store.
pub fn introspector() -> Result<SchemaIntrospector> {
    let introspector = SchemaIntrospector::empty()?;
    introspector.load_file(fixture("mini_brick.ttl"))?;
    introspector.load_file(fixture("units.ttl"))?;
    Ok(introspector)
}

pub fn schema() -> Result<Arc<Schema>> {
    schema_with(|_| {})
}

pub fn schema_with(configure: impl FnOnce(&mut SchemaConfig)) -> Result<Arc<Schema>> {
    let mut config = SchemaConfig::default();
    configure(&mut config);
    Ok(Arc::new(Schema::build(&introspector()?, &config)?))
}

pub fn session() -> Result<Session> {
    Ok(Session::new(schema()?))
}

pub fn brick(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{BRICK}{local}"))
}

pub fn unit(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{UNIT}{local}"))
}

pub fn bldg(local: &str) -> String {
    format!("{BLDG}{local}")
}

pub fn bldg_node(local: &str) -> NamedNode {
    NamedNode::new_unchecked(bldg(local))
}

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }
}
