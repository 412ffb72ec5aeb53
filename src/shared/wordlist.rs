//! Word lists for generating human-readable task names.
//! Format: adjective-name (e.g., "brave-heron", "quiet-lynx")

use rand::Rng;

pub const NAME_SEPARATOR: &str = "-";

const ADJECTIVES: &[&str] = &[
    "able", "amber", "ample", "awake", "bold", "brave", "brief", "bright", "brisk", "calm",
    "candid", "civil", "clear", "clever", "cosmic", "crisp", "curious", "daring", "deep",
    "eager", "early", "easy", "epic", "exact", "fair", "fancy", "fast", "fine", "firm", "fleet",
    "fluent", "fond", "frank", "fresh", "gentle", "giant", "glad", "golden", "grand", "happy",
    "hardy", "honest", "humble", "ideal", "jolly", "keen", "kind", "lively", "loyal", "lucky",
    "mellow", "merry", "mighty", "modest", "neat", "noble", "patient", "plucky", "polite",
    "prime", "proud", "quick", "quiet", "rapid", "ready", "regal", "robust", "rustic", "sharp",
    "shiny", "silent", "simple", "sleek", "smart", "snappy", "solid", "sound", "steady",
    "stellar", "sturdy", "sunny", "super", "swift", "tender", "tidy", "tough", "trusty",
    "upbeat", "valid", "vast", "vivid", "warm", "wise", "witty", "young", "zesty",
];

const NAMES: &[&str] = &[
    "adder", "badger", "beagle", "bison", "bobcat", "camel", "caribou", "cheetah", "cobra",
    "condor", "corgi", "cougar", "coyote", "crane", "cricket", "dingo", "dolphin", "donkey",
    "eagle", "egret", "falcon", "ferret", "finch", "gazelle", "gecko", "gibbon", "gopher",
    "grouse", "hare", "hawk", "heron", "hornet", "husky", "ibex", "iguana", "impala", "jackal",
    "jaguar", "kestrel", "kiwi", "koala", "lemur", "leopard", "llama", "lobster", "lynx",
    "macaw", "magpie", "mallard", "marten", "mink", "moose", "narwhal", "newt", "ocelot",
    "orca", "osprey", "otter", "owl", "panda", "panther", "parrot", "pelican", "penguin",
    "pika", "puffin", "python", "quail", "rabbit", "raven", "robin", "salmon", "seal", "shrew",
    "skunk", "sparrow", "squid", "stork", "swan", "tapir", "tern", "tiger", "toucan", "trout",
    "turtle", "viper", "walrus", "weasel", "whale", "wombat", "wren", "yak", "zebra",
];

/// Generate a random two-word name such as `"brave-heron"`.
pub fn generate_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let name = NAMES[rng.random_range(0..NAMES.len())];
    format!("{adjective}{NAME_SEPARATOR}{name}")
}
