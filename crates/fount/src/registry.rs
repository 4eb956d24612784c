//! Explicit code→constructor registries for direct handlers, generators, and
//! forwarders.
//!
//! Built once at startup and injected into the server, so initialization
//! order is well-defined and tests can assemble partial registries with fake
//! caches. Registries are open and append-only: registering new synthetic
//! behaviors is the extension point of the whole tool.

use crate::cache::{FillCache, GrowCache, TileCache};
use crate::directive::DirectiveMap;
use crate::forwarders::{self, ForwardContext, Wrapped};
use crate::generators::{
    BinfGenerator, FillGenerator, GenParams, Generator, StampGenerator, StampKind,
    TextureGenerator,
};
use crate::handlers;
use crate::serve::OriginBody;
use hyper::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A direct handler takes full control of the response; the pipeline stops.
pub type DirectHandler = Arc<dyn Fn(&DirectiveMap) -> Response<OriginBody> + Send + Sync>;

pub type GeneratorCtor = Arc<dyn Fn(&GenParams) -> Box<dyn Generator> + Send + Sync>;

pub type ForwarderCtor =
    Arc<dyn Fn(Box<dyn Generator>, &mut ForwardContext<'_>) -> Wrapped + Send + Sync>;

/// Default generator code used when `p` is absent or unknown.
pub const DEFAULT_GENERATOR: &str = "txt";

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, DirectHandler>,
    generators: HashMap<String, GeneratorCtor>,
    forwarders: HashMap<String, ForwarderCtor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in set. `tex` is registered only when the embedded
    /// texture decodes.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register_handler("raw", Arc::new(handlers::raw_handler));

        registry.register_generator(
            "txt",
            Arc::new(|p| Box::new(StampGenerator::new(StampKind::Text, p))),
        );
        registry.register_generator(
            "bin",
            Arc::new(|p| Box::new(StampGenerator::new(StampKind::Binary, p))),
        );
        registry.register_generator("binf", Arc::new(|p| Box::new(BinfGenerator::new(p))));

        let fill: Arc<dyn GrowCache> = Arc::new(FillCache::new(b'3'));
        registry.register_generator(
            "gen3s",
            Arc::new(move |p| Box::new(FillGenerator::new(fill.clone(), p))),
        );

        match crate::generators::decode_tile() {
            Some(tile) => {
                let cache = Arc::new(TileCache::new(tile));
                registry.register_generator(
                    "tex",
                    Arc::new(move |p| Box::new(TextureGenerator::new(cache.clone(), p))),
                );
            }
            None => info!("tex generator unavailable"),
        }

        registry.register_forwarder("delay", Arc::new(forwarders::delay::build));
        registry.register_forwarder("posevt", Arc::new(forwarders::posevt::build));

        registry
    }

    pub fn register_handler(&mut self, code: &str, handler: DirectHandler) {
        self.handlers.insert(code.to_string(), handler);
    }

    pub fn register_generator(&mut self, code: &str, ctor: GeneratorCtor) {
        self.generators.insert(code.to_string(), ctor);
    }

    pub fn register_forwarder(&mut self, code: &str, ctor: ForwarderCtor) {
        self.forwarders.insert(code.to_string(), ctor);
    }

    pub fn handler(&self, code: &str) -> Option<&DirectHandler> {
        self.handlers.get(code)
    }

    /// Resolve a generator constructor, silently falling back to the default
    /// text stamp for unknown codes.
    pub fn generator(&self, code: &str) -> Option<&GeneratorCtor> {
        self.generators
            .get(code)
            .or_else(|| self.generators.get(DEFAULT_GENERATOR))
    }

    pub fn forwarder(&self, code: &str) -> Option<&ForwarderCtor> {
        self.forwarders.get(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_expected_codes() {
        let registry = Registry::builtin();
        for code in ["txt", "bin", "binf", "gen3s", "tex"] {
            assert!(registry.generators.contains_key(code), "missing {code}");
        }
        assert!(registry.forwarder("delay").is_some());
        assert!(registry.forwarder("posevt").is_some());
        assert!(registry.handler("raw").is_some());
    }

    #[test]
    fn unknown_generator_falls_back_to_text_stamp() {
        let registry = Registry::builtin();
        let map = DirectiveMap::new();
        let params = GenParams {
            size: 8,
            lm: 0,
            rnd: 0,
            directives: &map,
        };
        let gen = registry.generator("nope").unwrap()(&params);
        assert_eq!(gen.content_type(), "text/plain");
    }

    #[test]
    fn unknown_forwarder_and_handler_are_none() {
        let registry = Registry::builtin();
        assert!(registry.forwarder("nope").is_none());
        assert!(registry.handler("nope").is_none());
    }
}
