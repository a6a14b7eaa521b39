use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use super::*;

fn number() -> BaseType {
	BaseType::new("number")
}

fn int() -> DataType {
	DataType::new(BaseType::extending("int", &number()))
}

fn json() -> MediaType {
	"application/json".parse().unwrap()
}

#[rstest]
#[case::exact(DataType::named("string"), DataType::named("string"), true)]
#[case::widening(DataType::new(number()), int(), true)]
#[case::narrowing(int(), DataType::new(number()), false)]
#[case::root_accepts_all(DataType::object(), int(), true)]
#[case::unrelated(DataType::named("string"), int(), false)]
#[case::media_wildcard_when_unspecified(DataType::named("string"), DataType::named("string").with_media_type(json()), true)]
#[case::media_mismatch(
	DataType::named("string").with_media_type(json()),
	DataType::named("string").with_media_type("text/plain".parse().unwrap()),
	false
)]
#[case::media_required_but_absent(DataType::named("string").with_media_type(json()), DataType::named("string"), false)]
#[case::star_media_accepts_absent(DataType::named("string").with_media_type(MediaType::any()), DataType::named("string"), true)]
#[case::item_checked_when_both_present(
	DataType::named("list").with_item_type(DataType::new(number())),
	DataType::named("list").with_item_type(DataType::named("string")),
	false
)]
#[case::item_widening(
	DataType::named("list").with_item_type(DataType::new(number())),
	DataType::named("list").with_item_type(int()),
	true
)]
#[case::item_ignored_when_one_side_missing(DataType::named("list"), DataType::named("list").with_item_type(int()), true)]
fn compatibility(#[case] accepting: DataType, #[case] candidate: DataType, #[case] expected: bool) {
	assert_eq!(accepting.is_compatible_with(&candidate), expected);
}

#[test]
fn specificity_prefers_exact_over_supertype() {
	let target = int();
	assert_eq!(target.specificity(&int()), Some(0));
	assert_eq!(DataType::new(number()).specificity(&int()), Some(1));
	assert_eq!(DataType::object().specificity(&int()), Some(2));
}

#[test]
fn hash_key_separates_components() {
	let plain = DataType::named("string");
	let with_media = plain.clone().with_media_type(json());
	let with_item = plain.clone().with_item_type(DataType::named("byte"));

	assert_ne!(plain.hash_key(), with_media.hash_key());
	assert_ne!(plain.hash_key(), with_item.hash_key());
	assert_ne!(with_media.hash_key(), with_item.hash_key());
}

#[test]
fn display_includes_all_parts() {
	let dt = DataType::named("list").with_item_type(DataType::named("string")).with_media_type(json());
	assert_eq!(dt.to_string(), "list<string> (application/json)");
	assert_eq!(ConversionPair::new(&DataType::named("a"), &DataType::named("b")).to_string(), "a -> b");
}

fn arb_data_type() -> impl Strategy<Value = DataType> {
	let name = prop::sample::select(vec!["string", "int", "bytes", "stream", "object"]);
	let media = prop::option::of(prop::sample::select(vec!["application/json", "text/plain", "text/*", "*/*"]));
	let item = prop::option::of(prop::sample::select(vec!["string", "int"]));
	(name, media, item).prop_map(|(name, media, item)| {
		let mut dt = DataType::named(name);
		if let Some(item) = item {
			dt = dt.with_item_type(DataType::named(item));
		}
		if let Some(media) = media {
			dt = dt.with_media_type(media.parse().unwrap());
		}
		dt
	})
}

proptest! {
	#[test]
	fn compatibility_is_reflexive(dt in arb_data_type()) {
		prop_assert!(dt.is_compatible_with(&dt));
	}

	#[test]
	fn equal_descriptors_share_hash_key(dt in arb_data_type()) {
		let copy = dt.clone();
		prop_assert_eq!(dt.hash_key(), copy.hash_key());
	}

	#[test]
	fn root_without_media_accepts_everything(dt in arb_data_type()) {
		prop_assert!(DataType::object().is_compatible_with(&dt));
	}
}
