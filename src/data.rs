use std::path::Path;

use anyhow::{Context as _, bail};
use facet_bubbles::Entity;
use facet_bubbles::entity::load_entities;
use serde_json::json;

const GENRES: [&str; 5] = ["puzzle", "strategy", "platformer", "rpg", "racing"];
const ERAS: [&str; 3] = ["90s", "00s", "10s"];
const TAGS: [&str; 8] = [
    "co-op", "pixel-art", "open-world", "roguelike", "story", "competitive", "casual", "retro",
];
const COUNTRIES: [&str; 4] = ["jp", "us", "fi", "pl"];

pub(crate) fn load_or_sample(path: Option<&Path>) -> anyhow::Result<Vec<Entity>> {
    let Some(path) = path else {
        return Ok(sample_entities(42));
    };

    let entities = load_entities(path)
        .with_context(|| format!("loading entities from {}", path.display()))?;
    if entities.is_empty() {
        bail!("{} contains no entities", path.display());
    }
    Ok(entities)
}

/// Built-in demo set with array, primitive and object facets.
pub(crate) fn sample_entities(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|index| {
            let tags = [
                TAGS[index % TAGS.len()],
                TAGS[(index * 3 + 1) % TAGS.len()],
            ];
            Entity::new(format!("item-{index:02}"))
                .with_facet("genre", json!(GENRES[index % GENRES.len()]))
                .with_facet("era", json!(ERAS[(index / 4) % ERAS.len()]))
                .with_facet("tags", json!(tags))
                .with_facet(
                    "studio",
                    json!({
                        "country": COUNTRIES[(index / 3) % COUNTRIES.len()],
                        "indie": index % 3 != 0,
                    }),
                )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn sample_ids_are_unique() {
        let entities = sample_entities(42);
        let ids = entities
            .iter()
            .map(|entity| entity.id.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 42);
        assert!(entities.iter().all(|entity| entity.facets.len() == 4));
    }

    #[test]
    fn missing_file_carries_path_context() {
        let error = load_or_sample(Some(Path::new("/nonexistent/entities.json"))).unwrap_err();
        assert!(format!("{error:#}").contains("/nonexistent/entities.json"));
    }
}
