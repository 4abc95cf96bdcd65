use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Phantom-tagged string identifier, shared by every id-like value in the
/// core so that a `SwitchId` and a `LinkId` can never be confused at the
/// type level even though both are plain strings under the hood.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub struct Id<T> {
    pub id: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");
        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct SwitchTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct LinkTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct EndpointTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct TenantTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct PledgeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct MlagTag;

pub type SwitchId = Id<SwitchTag>;
pub type LinkId = Id<LinkTag>;
pub type EndpointId = Id<EndpointTag>;
pub type TenantId = Id<TenantTag>;
pub type PledgeId = Id<PledgeTag>;
pub type MlagGroupId = Id<MlagTag>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_the_bare_string() {
        let id: SwitchId = SwitchId::new("s1");
        assert_eq!(id.to_string(), "s1");
    }

    #[test]
    fn debug_names_the_concrete_id_type_not_the_generic() {
        let id: SwitchId = SwitchId::new("s1");
        assert_eq!(format!("{:?}", id), "SwitchId: \"s1\"");

        let id: PledgeId = PledgeId::new("p1");
        assert_eq!(format!("{:?}", id), "PledgeId: \"p1\"");
    }

    #[test]
    fn equal_strings_are_equal_ids_within_the_same_type() {
        assert_eq!(SwitchId::new("s1"), SwitchId::new("s1"));
        assert_ne!(SwitchId::new("s1"), SwitchId::new("s2"));
    }

    #[test]
    fn as_str_exposes_the_underlying_string() {
        let id: TenantId = TenantId::new("tenant-a");
        assert_eq!(id.as_str(), "tenant-a");
    }
}
