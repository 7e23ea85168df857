//! Named generation-parameter presets.
//!
//! These mirror the presets shipped with the Kobold Lite UI. The parameters
//! are opaque to this crate; they are merged into the request payload as-is
//! and interpreted by the remote service.

use serde::Serialize;

/// Name of the preset used when a request does not pick one.
pub const DEFAULT_PRESET_NAME: &str = "[Default]";

/// One named sampler configuration.
///
/// Field order matches the payload layout the service expects; `description`
/// is part of the payload too (the service ignores unknown keys).
#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    pub description: &'static str,
    pub temp: f64,
    pub genamt: u32,
    pub top_k: u32,
    pub top_p: f64,
    pub top_a: f64,
    pub typical: f64,
    pub tfs: f64,
    pub rep_pen: f64,
    pub rep_pen_range: u32,
    pub rep_pen_slope: f64,
    pub sampler_order: [u8; 7],
}

static CATALOG: &[(&str, Preset)] = &[
    (
        "[Default]",
        Preset {
            description: "Known Working Settings.",
            temp: 0.7,
            genamt: 80,
            top_k: 0,
            top_p: 0.92,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.08,
            rep_pen_range: 256,
            rep_pen_slope: 0.7,
            sampler_order: [6, 0, 1, 2, 3, 4, 5],
        },
    ),
    (
        "Inverted Mirror",
        Preset {
            description: "Good defaults with a different sampler order.",
            temp: 0.7,
            genamt: 80,
            top_k: 0,
            top_p: 0.92,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.08,
            rep_pen_range: 256,
            rep_pen_slope: 0.7,
            sampler_order: [0, 1, 2, 3, 4, 5, 6],
        },
    ),
    (
        "Godlike",
        Preset {
            description: "Makes AI give a descriptive and sensual output.",
            temp: 0.7,
            genamt: 80,
            top_k: 0,
            top_p: 0.5,
            top_a: 0.75,
            typical: 0.19,
            tfs: 0.97,
            rep_pen: 1.1,
            rep_pen_range: 1024,
            rep_pen_slope: 0.7,
            sampler_order: [6, 5, 4, 3, 2, 1, 0],
        },
    ),
    (
        "Mayday",
        Preset {
            description: "Wacky plot, creativity from AI, crazy stories you want AI to weird out.",
            temp: 1.05,
            genamt: 80,
            top_k: 0,
            top_p: 0.95,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.1,
            rep_pen_range: 1024,
            rep_pen_slope: 0.7,
            sampler_order: [6, 0, 1, 2, 3, 4, 5],
        },
    ),
    (
        "Good Winds",
        Preset {
            description: "Let AI direct the plot, but still stay logical.",
            temp: 0.7,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.9,
            rep_pen: 1.1,
            rep_pen_range: 1024,
            rep_pen_slope: 0.7,
            sampler_order: [6, 0, 1, 2, 3, 4, 5],
        },
    ),
    (
        "Liminal Drift",
        Preset {
            description: "Drives coherent dialogue, responses, and behavior, sometimes surreal situations arise based on information already present in the story.",
            temp: 0.66,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.96,
            typical: 0.6,
            tfs: 1.0,
            rep_pen: 1.1,
            rep_pen_range: 1024,
            rep_pen_slope: 0.7,
            sampler_order: [6, 4, 5, 1, 0, 2, 3],
        },
    ),
    (
        "TavernAI",
        Preset {
            description: "Preset used in TavernAI.",
            temp: 0.79,
            genamt: 80,
            top_k: 0,
            top_p: 0.9,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.95,
            rep_pen: 1.19,
            rep_pen_range: 1024,
            rep_pen_slope: 0.9,
            sampler_order: [6, 0, 1, 2, 3, 4, 5],
        },
    ),
    (
        "Storywriter 6B",
        Preset {
            description: "Optimized settings for relevant output.",
            temp: 0.72,
            genamt: 80,
            top_k: 0,
            top_p: 0.73,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.1,
            rep_pen_range: 1024,
            rep_pen_slope: 0.2,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Coherent Creativity 6B",
        Preset {
            description: "A good balance between coherence, creativity, and quality of prose.",
            temp: 0.51,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.99,
            rep_pen: 1.2,
            rep_pen_range: 2048,
            rep_pen_slope: 0.0,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Luna Moth 6B",
        Preset {
            description: "A great degree of creativity without losing coherency.",
            temp: 1.5,
            genamt: 80,
            top_k: 85,
            top_p: 0.24,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.2,
            rep_pen_range: 2048,
            rep_pen_slope: 0.0,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Best Guess 6B",
        Preset {
            description: "A subtle change with alternative context settings.",
            temp: 0.8,
            genamt: 80,
            top_k: 100,
            top_p: 0.9,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.5,
            rep_pen_range: 2048,
            rep_pen_slope: 3.4,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Pleasing Results 6B",
        Preset {
            description: "Expectable output with alternative context settings.",
            temp: 0.44,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.5,
            rep_pen_range: 2048,
            rep_pen_slope: 6.8,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Genesis 13B",
        Preset {
            description: "Stable and logical, but with scattered creativity.",
            temp: 0.63,
            genamt: 80,
            top_k: 0,
            top_p: 0.98,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.98,
            rep_pen: 1.05,
            rep_pen_range: 2048,
            rep_pen_slope: 0.1,
            sampler_order: [6, 2, 0, 3, 5, 1, 4],
        },
    ),
    (
        "Basic Coherence 13B",
        Preset {
            description: "Keep things on track.",
            temp: 0.59,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.87,
            rep_pen: 1.1,
            rep_pen_range: 2048,
            rep_pen_slope: 0.3,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Ouroboros 13B",
        Preset {
            description: "Versatile, conforms well to poems, lists, chat, etc.",
            temp: 1.07,
            genamt: 80,
            top_k: 100,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.93,
            rep_pen: 1.05,
            rep_pen_range: 404,
            rep_pen_slope: 0.8,
            sampler_order: [6, 0, 5, 3, 2, 1, 4],
        },
    ),
    (
        "Ace of Spades 13B",
        Preset {
            description: "Expressive, while still staying focused.",
            temp: 1.15,
            genamt: 80,
            top_k: 0,
            top_p: 0.95,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.8,
            rep_pen: 1.05,
            rep_pen_range: 2048,
            rep_pen_slope: 7.0,
            sampler_order: [6, 3, 2, 0, 5, 1, 4],
        },
    ),
    (
        "Low Rider 13B",
        Preset {
            description: "Reliable, aimed at story development.",
            temp: 0.94,
            genamt: 80,
            top_k: 12,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.94,
            rep_pen: 1.05,
            rep_pen_range: 2048,
            rep_pen_slope: 0.2,
            sampler_order: [6, 5, 0, 2, 3, 1, 4],
        },
    ),
    (
        "Pro Writer 13B",
        Preset {
            description: "Optimal setting for readability, based on AI-powered mass statistical analysis of Euterpe output.",
            temp: 1.35,
            genamt: 80,
            top_k: 0,
            top_p: 1.0,
            top_a: 0.0,
            typical: 1.0,
            tfs: 0.69,
            rep_pen: 1.15,
            rep_pen_range: 2048,
            rep_pen_slope: 0.1,
            sampler_order: [6, 3, 2, 5, 0, 1, 4],
        },
    ),
    (
        "Default 20B",
        Preset {
            description: "Good starting settings for NeoX 20B.",
            temp: 0.6,
            genamt: 80,
            top_k: 0,
            top_p: 0.9,
            top_a: 0.0,
            typical: 1.0,
            tfs: 1.0,
            rep_pen: 1.04,
            rep_pen_range: 2048,
            rep_pen_slope: 0.7,
            sampler_order: [6, 0, 1, 2, 3, 4, 5],
        },
    ),
];

/// Look up a preset by its catalog name.
pub fn preset(name: &str) -> Option<&'static Preset> {
    CATALOG.iter().find(|(n, _)| *n == name).map(|(_, p)| p)
}

/// The `"[Default]"` preset.
pub fn default_preset() -> &'static Preset {
    preset(DEFAULT_PRESET_NAME).expect("catalog contains the default preset")
}

/// Names of all shipped presets, in catalog order.
pub fn preset_names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_is_present() {
        let p = default_preset();
        assert_eq!(p.description, "Known Working Settings.");
        assert_eq!(p.sampler_order, [6, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn lookup_by_name() {
        let p = preset("Luna Moth 6B").expect("catalog entry");
        assert_eq!(p.top_k, 85);
        assert!(preset("No Such Preset").is_none());
    }

    #[test]
    fn catalog_names_are_unique() {
        let names: Vec<_> = preset_names().collect();
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn presets_serialize_with_payload_keys() {
        let value = serde_json::to_value(default_preset()).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "description",
            "temp",
            "genamt",
            "top_k",
            "top_p",
            "top_a",
            "typical",
            "tfs",
            "rep_pen",
            "rep_pen_range",
            "rep_pen_slope",
            "sampler_order",
        ] {
            assert!(object.contains_key(key), "missing key {key}");
        }
    }
}
