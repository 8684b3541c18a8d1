#![cfg(target_arch = "wasm32")]

use sapling_dom::{Child, Element, Ref, Renderer};
use std::{cell::Cell, rc::Rc};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

mod web_container_;
use web_container_::{container, inner_html};

#[wasm_bindgen_test]
fn text() {
	let (target, container) = container();
	let mut renderer = Renderer::new(target);
	renderer.render_tree("Hello sapling-dom!", &container).unwrap();
	assert_eq!(inner_html(&container), "Hello sapling-dom!");
}

#[wasm_bindgen_test]
fn element_ref() {
	test_create(|node_ref| Element::tag("p").node_ref(node_ref).child("Hello sapling-dom!").build(), "<p>Hello sapling-dom!</p>");
}

#[wasm_bindgen_test]
fn attribute() {
	test_create(
		|node_ref| Element::tag("a").node_ref(node_ref).prop("href", "#top").child("top").build(),
		r##"<a href="#top">top</a>"##,
	);
}

fn test_create(vdom: impl FnOnce(Ref) -> Child, html: &str) {
	let (target, container) = container();
	let mut renderer = Renderer::new(target);

	let got_ref = Rc::new(Cell::new(0));
	let node_ref = Ref::callback({
		let got_ref = got_ref.clone();
		move |value| {
			if value.and_then(|value| value.target::<web_sys::Node>()).is_some() {
				got_ref.set(got_ref.get() + 1);
			}
		}
	});

	renderer.render_tree(vdom(node_ref), &container).unwrap();
	assert_eq!(got_ref.get(), 1);
	assert_eq!(inner_html(&container), html);
}

#[wasm_bindgen_test]
fn false_attributes() {
	let (target, container) = container();
	let mut renderer = Renderer::new(target);
	renderer.render_tree(Element::tag("div").prop("hidden", false).prop("data-hidden", false).build(), &container).unwrap();
	assert_eq!(inner_html(&container), r#"<div data-hidden="false"></div>"#);
}
