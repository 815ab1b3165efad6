//! Identity of API entities, as used for cache tagging.

use crate::models::{FieldAgent, Household, Region};
use crate::tags::{Tag, TagKind};
use std::fmt::Display;

/// Trait implemented by every entity the API returns in lists.
///
/// # Example
///
/// ```
/// use survey_monitor::entity::ApiEntity;
/// use survey_monitor::models::Region;
///
/// let region = Region { code: "01".to_string(), name: "DAKAR".to_string() };
/// assert_eq!(region.tag().to_string(), "Regions:01");
/// ```
pub trait ApiEntity {
    /// Type of the entity's identity key.
    type Id: Display;

    /// Return the entity's unique identity.
    fn entity_id(&self) -> Self::Id;

    /// Tag family for this entity type.
    fn tag_kind() -> TagKind;

    /// Tag identifying this one entity.
    fn tag(&self) -> Tag {
        Tag::id(Self::tag_kind(), self.entity_id().to_string())
    }
}

impl ApiEntity for Region {
    type Id = String;

    fn entity_id(&self) -> String {
        self.code.clone()
    }

    fn tag_kind() -> TagKind {
        TagKind::Regions
    }
}

impl ApiEntity for Household {
    type Id = String;

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn tag_kind() -> TagKind {
        TagKind::Households
    }
}

impl ApiEntity for FieldAgent {
    type Id = String;

    fn entity_id(&self) -> String {
        self.login.clone()
    }

    fn tag_kind() -> TagKind {
        TagKind::FieldAgents
    }
}

/// Tags for a list result: one per entity plus the kind's `LIST` tag.
///
/// A missing result (the request failed) provides only the `LIST` tag.
pub fn list_tags<T: ApiEntity>(items: Option<&[T]>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = items
        .unwrap_or_default()
        .iter()
        .map(ApiEntity::tag)
        .collect();
    tags.push(Tag::list(T::tag_kind()));
    tags
}
