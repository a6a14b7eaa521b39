use std::sync::Arc;

use conduit_primitives::{BaseType, DataType};
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::tests::support::{appender, converter, dt};

fn number() -> DataType {
	DataType::new(BaseType::new("number"))
}

fn int() -> DataType {
	DataType::new(BaseType::extending("int", &BaseType::new("number")))
}

fn names(list: &[Arc<dyn Converter>]) -> Vec<&str> {
	list.iter().map(|c| c.name()).collect()
}

/// Non-fallback strategy that answers every pair with one converter.
struct Pinned(Arc<dyn Converter>);

impl ResolutionStrategy for Pinned {
	fn name(&self) -> &str {
		"pinned"
	}

	fn resolve(&self, _source: &DataType, _target: &DataType) -> Option<Arc<dyn Converter>> {
		Some(self.0.clone())
	}
}

#[test]
fn most_specific_return_type_wins() {
	let engine = ResolutionEngine::new();
	let to_number = Arc::new(FnConverter::new("to-number", [dt("string")], number(), Ok)) as Arc<dyn Converter>;
	let to_int = Arc::new(FnConverter::new("to-int", [dt("string")], int(), Ok).with_weight(100)) as Arc<dyn Converter>;
	engine.register_converter(to_int);
	engine.register_converter(to_number);

	assert_eq!(engine.resolve(&dt("string"), &number()).unwrap().name(), "to-number");
	assert_eq!(engine.resolve(&dt("string"), &int()).unwrap().name(), "to-int");
	assert_eq!(engine.resolve(&dt("string"), &DataType::object()).unwrap().name(), "to-number");
}

#[rstest]
#[case(&[("a", 1), ("b", 5), ("c", 3)], "b")]
#[case(&[("a", 2), ("b", 2), ("c", 2)], "a")]
#[case(&[("a", 0), ("b", 7), ("c", 7)], "b")]
fn weight_then_registration_order_breaks_ties(#[case] registered: &[(&str, i32)], #[case] winner: &str) {
	let engine = ResolutionEngine::new();
	for (name, weight) in registered {
		engine.register_converter(converter(name, &["string"], "json", *weight));
	}
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), winner);
}

#[test]
fn resolution_is_memoized_until_mutation() {
	let engine = ResolutionEngine::new();
	engine.register_converter(converter("first", &["string"], "json", 1));

	let a = engine.resolve(&dt("string"), &dt("json")).unwrap();
	let b = engine.resolve(&dt("string"), &dt("json")).unwrap();
	assert!(same_converter(&a, &b));
	assert_eq!(engine.cached_entries(), 1);

	let generation = engine.generation();
	engine.register_converter(converter("heavier", &["string"], "json", 9));
	assert!(engine.generation() > generation);
	assert_eq!(engine.cached_entries(), 0);
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "heavier");
}

#[test]
fn missing_converter_is_not_cached() {
	let engine = ResolutionEngine::new();
	let err = engine.resolve(&dt("string"), &dt("json")).unwrap_err();
	assert_eq!(err.pair.target, dt("json"));
	assert_eq!(engine.cached_entries(), 0);

	engine.register_converter(converter("late", &["string"], "json", 0));
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "late");
}

#[test]
fn duplicate_handle_is_ignored() {
	let engine = ResolutionEngine::new();
	let c = converter("once", &["string"], "json", 0);
	assert!(engine.register_converter(c.clone()));
	let generation = engine.generation();
	assert!(!engine.register_converter(c.clone()));
	assert_eq!(engine.generation(), generation);
	assert_eq!(engine.converters().len(), 1);

	assert!(engine.unregister_converter(&c));
	assert!(!engine.unregister_converter(&c));
	assert!(engine.resolve(&dt("string"), &dt("json")).is_err());
}

#[test]
fn reweighting_invalidates_cached_choice() {
	let engine = ResolutionEngine::new();
	let low = converter("low", &["string"], "json", 1);
	engine.register_converter(low.clone());
	engine.register_converter(converter("high", &["string"], "json", 5));
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "high");

	assert!(engine.set_priority_weight(&low, 10));
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "low");

	let stranger = converter("stranger", &["string"], "json", 0);
	assert!(!engine.set_priority_weight(&stranger, 99));
}

#[test]
fn resolve_all_lists_every_candidate_in_order() {
	let engine = ResolutionEngine::new();
	engine.register_converter(converter("a", &["string"], "json", 0));
	engine.register_converter(converter("b", &["xml"], "json", 0));
	engine.register_converter(converter("c", &["string", "xml"], "json", 0));
	engine.register_converter(converter("d", &["string"], "yaml", 0));

	let all = engine.resolve_all(&dt("string"), &dt("json"));
	assert_eq!(names(&all), ["a", "c"]);
	let again = engine.resolve_all(&dt("string"), &dt("json"));
	assert!(Arc::ptr_eq(&all, &again));

	assert!(engine.resolve_all(&dt("bytes"), &dt("json")).is_empty());
}

#[test]
fn fallback_strategies_are_consulted_last() {
	let engine = ResolutionEngine::new();
	engine.register_converter(converter("direct", &["string"], "json", 0));
	let pinned_converter = converter("pinned", &["bytes"], "bytes", 0);
	engine.register_strategy(Arc::new(Pinned(pinned_converter)));

	let order: Vec<String> = engine.strategies().iter().map(|s| s.name().to_string()).collect();
	assert_eq!(order, ["pinned", "type-based"]);
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "pinned");
}

#[test]
fn strategy_removal_restores_previous_answers() {
	let engine = ResolutionEngine::new();
	engine.register_converter(converter("direct", &["string"], "json", 0));
	let pinned: Arc<dyn ResolutionStrategy> = Arc::new(Pinned(converter("pinned", &["bytes"], "bytes", 0)));
	engine.register_strategy(pinned.clone());
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "pinned");

	assert!(engine.unregister_strategy(&pinned));
	assert_eq!(engine.resolve(&dt("string"), &dt("json")).unwrap().name(), "direct");
}

#[test]
fn empty_engine_resolves_nothing() {
	let engine = ResolutionEngine::empty();
	engine.register_converter(converter("direct", &["string"], "json", 0));
	assert!(engine.resolve(&dt("string"), &dt("json")).is_err());
	assert_eq!(engine.resolve_all(&dt("string"), &dt("json")).len(), 1);
}

#[test]
fn type_based_strategy_tracks_notifications() {
	let strategy = TypeBasedStrategy::new();
	let c = converter("c", &["string"], "json", 0);
	strategy.converter_changed(&c, RegistryAction::Added);
	strategy.converter_changed(&c, RegistryAction::Added);
	assert_eq!(strategy.len(), 1);
	assert!(strategy.resolve(&dt("string"), &dt("json")).is_some());
	assert!(strategy.resolve(&dt("json"), &dt("string")).is_none());

	strategy.converter_changed(&c, RegistryAction::Removed);
	assert!(strategy.is_empty());
}

#[test]
fn graph_tracks_vertices_and_edges() {
	let graph = GraphStrategy::new();
	let to_bytes = converter("to-bytes", &["string"], "bytes", 0);
	let to_json = converter("to-json", &["string", "xml"], "json", 0);

	graph.converter_changed(&to_bytes, RegistryAction::Added);
	graph.converter_changed(&to_bytes, RegistryAction::Added);
	assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));

	graph.converter_changed(&to_json, RegistryAction::Added);
	assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 3));

	graph.converter_changed(&to_json, RegistryAction::Removed);
	assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));
	assert!(!graph.contains_vertex(&dt("xml")));
	assert!(graph.contains_vertex(&dt("string")));
}

#[test]
fn graph_composes_multi_hop_chains() {
	let engine = ResolutionEngine::new();
	engine.register_strategy(Arc::new(GraphStrategy::new()));
	engine.register_converter(appender("quote", "string", "quoted", "'"));
	engine.register_converter(appender("wrap", "quoted", "wrapped", "]"));

	let direct = engine.resolve(&dt("string"), &dt("quoted")).unwrap();
	assert_eq!(direct.name(), "quote");

	let chain = engine.resolve(&dt("string"), &dt("wrapped")).unwrap();
	assert_eq!(chain.name(), "quote -> wrap");
	assert_eq!(chain.return_type(), &dt("wrapped"));

	let out = chain.convert(Box::new(String::from("x"))).unwrap();
	assert_eq!(*out.downcast::<String>().unwrap(), "x']");
}

#[test]
fn graph_respects_depth_limit() {
	let graph = GraphStrategy::with_max_depth(2);
	for (name, from, to) in [("ab", "a", "b"), ("bc", "b", "c"), ("cd", "c", "d")] {
		graph.converter_changed(&converter(name, &[from], to, 0), RegistryAction::Added);
	}
	assert!(graph.resolve(&dt("a"), &dt("c")).is_some());
	assert!(graph.resolve(&dt("a"), &dt("d")).is_none());
	assert!(graph.resolve(&dt("a"), &dt("b")).is_none());
}

#[test]
fn chain_failure_names_failing_link() {
	let chain = ConverterChain::new(vec![
		appender("quote", "string", "quoted", "'"),
		converter("identity", &["quoted"], "quoted", 0),
		appender("wrap", "bytes", "wrapped", "]"),
	])
	.unwrap();

	let err = chain.convert(Box::new(7_u32)).unwrap_err();
	assert_eq!(err.converter(), "quote");
	assert!(ConverterChain::new(Vec::new()).is_none());
}

#[test]
fn service_passes_compatible_values_through() {
	let engine = Arc::new(ResolutionEngine::new());
	let service = TransformationService::new(engine.clone());

	let same: String = service
		.transform_to(Box::new(String::from("v")), &dt("string"), &DataType::object())
		.unwrap();
	assert_eq!(same, "v");
	assert_eq!(engine.cached_entries(), 0);
}

#[test]
fn service_applies_resolved_converter() {
	let engine = Arc::new(ResolutionEngine::new());
	engine.register_converter(appender("quote", "string", "quoted", "'"));
	let service = TransformationService::new(engine);

	let out: String = service
		.transform_to(Box::new(String::from("v")), &dt("string"), &dt("quoted"))
		.unwrap();
	assert_eq!(out, "v'");

	let err = service
		.transform(Box::new(String::from("v")), &dt("string"), &dt("json"))
		.unwrap_err();
	assert!(matches!(err, TransformError::NoConverter(_)));

	let err = service
		.transform_to::<u64>(Box::new(String::from("v")), &dt("string"), &dt("quoted"))
		.unwrap_err();
	assert!(matches!(err, TransformError::Conversion(_)));
}
