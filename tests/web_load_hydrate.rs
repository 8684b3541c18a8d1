#![cfg(target_arch = "wasm32")]

use sapling_dom::{load::load_child_nodes, Element, Ref, Renderer};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

mod web_container_;
use web_container_::{container, inner_html};

const MARKUP: &str = r#"<ul class="list"><li>one</li><li>two</li></ul>"#;

#[wasm_bindgen_test]
fn load_round_trip() {
	let (_, source) = container();
	source.dyn_ref::<web_sys::Element>().unwrap().set_inner_html(MARKUP);

	let loaded = load_child_nodes(&source.child_nodes());
	assert_eq!(loaded.len(), 1);

	let (target, other) = container();
	let mut renderer = Renderer::new(target);
	renderer.render_tree(loaded.into_iter().next().unwrap(), &other).unwrap();
	assert_eq!(inner_html(&other), MARKUP);
}

#[wasm_bindgen_test]
fn hydration_keeps_nodes() {
	let (target, container) = container();
	container.dyn_ref::<web_sys::Element>().unwrap().set_inner_html(MARKUP);
	let server_list = container.first_child().unwrap();

	let list_ref = Ref::object();
	let mut renderer = Renderer::new(target);
	renderer
		.hydrate_tree(
			Element::tag("ul")
				.node_ref(list_ref.clone())
				.prop("class", "list")
				.child(Element::tag("li").child("one").build())
				.child(Element::tag("li").child("two").build())
				.build(),
			&container,
		)
		.unwrap();

	assert_eq!(inner_html(&container), MARKUP);
	let hydrated = list_ref.current().and_then(|value| value.target::<web_sys::Node>()).unwrap();
	assert!(hydrated.is_same_node(Some(&server_list)));
}
