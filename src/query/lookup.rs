use crate::errors::CompileError;
use bson::{Bson, Document, doc};

/// A left outer join against another collection, compiled into a `$lookup` stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupModel {
    /// The foreign collection.
    pub from: String,
    /// Join key on the input documents.
    pub local_field: String,
    /// Join key on the documents of `from`.
    pub foreign_field: String,
    /// Extra stages applied to the joined side. `None` keeps every joined document.
    pub pipeline: Option<Vec<Document>>,
    /// Output array field added to each input document.
    pub as_field: String,
}

impl LookupModel {
    #[must_use]
    pub fn new(from: impl Into<String>, local_field: impl Into<String>, foreign_field: impl Into<String>, as_field: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            pipeline: None,
            as_field: as_field.into(),
        }
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Vec<Document>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub(crate) fn to_stage(&self) -> Result<Document, CompileError> {
        if self.from.trim().is_empty() {
            return Err(CompileError::InvalidArgument("lookup requires a source collection".into()));
        }
        if self.as_field.trim().is_empty() {
            return Err(CompileError::InvalidArgument("lookup requires an output field".into()));
        }
        let pipeline: Vec<Bson> =
            self.pipeline.iter().flatten().cloned().map(Bson::Document).collect();
        Ok(doc! {
            "$lookup": {
                "from": self.from.as_str(),
                "localField": self.local_field.as_str(),
                "foreignField": self.foreign_field.as_str(),
                "pipeline": pipeline,
                "as": self.as_field.as_str(),
            }
        })
    }
}
