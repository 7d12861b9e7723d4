//! Metadata derivation: body fields, person, tag set and target filename.

pub mod body;
pub mod filename;
pub mod identity;

use crate::model::mail::ParsedMail;

use self::body::BodyMetadata;
use self::filename::FilenameTemplate;
use self::identity::{PersonDirectory, PersonTagPosition, TagSet};

/// Everything derived from one parsed mail.
#[derive(Debug, Clone)]
pub struct Derived {
    pub metadata: BodyMetadata,
    pub person: String,
    pub tags: TagSet,
    pub filename: String,
}

/// The metadata stages, bundled with their configuration.
#[derive(Debug, Clone, Default)]
pub struct MetadataDeriver {
    directory: PersonDirectory,
    template: FilenameTemplate,
    person_position: PersonTagPosition,
}

impl MetadataDeriver {
    pub fn new(
        directory: PersonDirectory,
        template: FilenameTemplate,
        person_position: PersonTagPosition,
    ) -> Self {
        Self {
            directory,
            template,
            person_position,
        }
    }

    /// Extract body fields, resolve the person, build the tag set and render
    /// the filename.
    pub fn derive(&self, mail: &ParsedMail) -> Derived {
        let metadata = body::extract(&mail.body_text);

        let person = identity::resolve(
            &mail.sender,
            metadata.person_override().ok(),
            &self.directory,
        );

        let tags = TagSet::with_person(
            metadata.tags().map(<[String]>::to_vec).unwrap_or_default(),
            &person,
            self.person_position,
        );

        let description = metadata.description().unwrap_or("");
        let filename = self.template.render(&mail.received_at, description, &tags);

        Derived {
            metadata,
            person,
            tags,
            filename,
        }
    }
}
