/**
 * Pair Resolver
 *
 * Only bidirectional models are usable: an `en-es` bundle needs an `es-en`
 * bundle of the same variant. This module turns a flat model list into
 * forward/reverse pairs and drops everything else.
 */
use std::collections::{HashMap, HashSet};

use super::{reverse_pair_id, Variant};

/// Anything that can take part in a pair
pub trait PairMember {
    fn pair_id(&self) -> &str;
    fn variant(&self) -> Variant;
}

/// Forward + reverse model sharing a variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair<M> {
    pub forward: M,
    pub reverse: M,
}

impl<M: PairMember> ModelPair<M> {
    pub fn variant(&self) -> Variant {
        self.forward.variant()
    }

    pub fn ids(&self) -> (&str, &str) {
        (self.forward.pair_id(), self.reverse.pair_id())
    }
}

impl ModelPair<super::DownloadableModel> {
    pub fn display_name(&self) -> String {
        format!(
            "{} ↔ {}",
            self.forward.source_lang.name, self.forward.target_lang.name
        )
    }
}

/// Resolve pairs, dropping (and logging) models without a reverse half
pub fn resolve_pairs<M: PairMember + Clone>(models: &[M]) -> Vec<ModelPair<M>> {
    resolve_pairs_with_orphans(models).0
}

/// Resolve pairs and also return the models that could not be paired.
///
/// Emission order follows the first-seen forward model within each variant.
pub fn resolve_pairs_with_orphans<M: PairMember + Clone>(
    models: &[M],
) -> (Vec<ModelPair<M>>, Vec<M>) {
    let mut pairs = Vec::new();
    let mut orphans = Vec::new();

    for variant in Variant::ALL {
        let group: Vec<&M> = models.iter().filter(|m| m.variant() == variant).collect();
        if group.is_empty() {
            continue;
        }

        let mut by_id: HashMap<&str, &M> = HashMap::new();
        for model in &group {
            by_id.entry(model.pair_id()).or_insert(*model);
        }

        let mut consumed: HashSet<&str> = HashSet::new();
        for model in group {
            let id = model.pair_id();
            if consumed.contains(id) {
                continue;
            }

            let reverse = reverse_pair_id(id)
                .filter(|reverse_id| reverse_id != id)
                .and_then(|reverse_id| {
                    by_id
                        .get_key_value(reverse_id.as_str())
                        .filter(|(key, _)| !consumed.contains(**key))
                        .map(|(key, m)| (*key, *m))
                });

            match reverse {
                Some((reverse_id, reverse_model)) => {
                    consumed.insert(id);
                    consumed.insert(reverse_id);
                    pairs.push(ModelPair {
                        forward: model.clone(),
                        reverse: reverse_model.clone(),
                    });
                }
                None => {
                    log::warn!(
                        "[PairResolver] {} ({}) has no reverse model, skipping",
                        id,
                        variant
                    );
                    orphans.push(model.clone());
                }
            }
        }
    }

    (pairs, orphans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Stub(&'static str, Variant);

    impl PairMember for Stub {
        fn pair_id(&self) -> &str {
            self.0
        }
        fn variant(&self) -> Variant {
            self.1
        }
    }

    #[test]
    fn test_drops_forward_without_reverse() {
        let models = vec![
            Stub("en-es", Variant::Lite),
            Stub("es-en", Variant::Lite),
            Stub("en-fr", Variant::Lite),
        ];
        let (pairs, orphans) = resolve_pairs_with_orphans(&models);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].ids(), ("en-es", "es-en"));
        assert_eq!(orphans, vec![Stub("en-fr", Variant::Lite)]);
    }

    #[test]
    fn test_reverse_must_share_variant() {
        let models = vec![Stub("en-de", Variant::Lite), Stub("de-en", Variant::Full)];
        assert!(resolve_pairs(&models).is_empty());
    }

    #[test]
    fn test_order_and_variants_independent() {
        let models = vec![
            Stub("fr-en", Variant::Full),
            Stub("de-en", Variant::Lite),
            Stub("en-fr", Variant::Full),
            Stub("en-de", Variant::Lite),
            Stub("en-fr", Variant::Lite),
            Stub("fr-en", Variant::Lite),
        ];
        let pairs = resolve_pairs(&models);
        let ids: Vec<_> = pairs
            .iter()
            .map(|p| (p.ids().0, p.ids().1, p.variant()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("de-en", "en-de", Variant::Lite),
                ("en-fr", "fr-en", Variant::Lite),
                ("fr-en", "en-fr", Variant::Full),
            ]
        );
    }

    #[test]
    fn test_self_pair_and_malformed_ids_are_orphans() {
        let models = vec![Stub("en-en", Variant::Lite), Stub("english", Variant::Lite)];
        let (pairs, orphans) = resolve_pairs_with_orphans(&models);
        assert!(pairs.is_empty());
        assert_eq!(orphans.len(), 2);
    }
}
