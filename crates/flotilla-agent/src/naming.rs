//! Container naming
//!
//! Every Docker container the supervisor creates is named with the
//! container id behind a fixed prefix, so a plain `docker ps` is enough to
//! tell the agent's containers from foreign ones, including after a
//! restart when the listing drives the orphan sweep.

use flotilla_spec::ContainerId;

/// Prefix of every Docker container name created by the supervisor.
pub const CONTAINER_NAME_PREFIX: &str = "flotilla-";

/// Docker name for a container id.
pub fn container_name(id: &ContainerId) -> String {
    format!("{CONTAINER_NAME_PREFIX}{id}")
}

/// Parse a Docker container name back into a container id.
///
/// Docker reports names with a leading `/`; both forms are accepted.
/// Returns `None` for containers the supervisor did not create.
pub fn parse_container_name(name: &str) -> Option<ContainerId> {
    let name = name.strip_prefix('/').unwrap_or(name);
    name.strip_prefix(CONTAINER_NAME_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(ContainerId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips_through_parse() {
        let id = ContainerId::from("c4a1");
        let name = container_name(&id);
        assert_eq!(name, "flotilla-c4a1");
        assert_eq!(parse_container_name(&name), Some(id));
    }

    #[test]
    fn parse_tolerates_leading_slash() {
        assert_eq!(
            parse_container_name("/flotilla-abc"),
            Some(ContainerId::from("abc"))
        );
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert_eq!(parse_container_name("user-thing"), None);
        assert_eq!(parse_container_name("/postgres"), None);
        assert_eq!(parse_container_name("flotilla-"), None);
    }
}
