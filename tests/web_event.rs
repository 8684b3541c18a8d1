#![cfg(target_arch = "wasm32")]

use sapling_dom::{Element, Handler, Renderer};
use std::{any::Any, cell::Cell, rc::Rc};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

mod web_container_;
use web_container_::container;

#[wasm_bindgen_test]
fn click() {
	let (target, container) = container();
	let mut renderer = Renderer::new(target);

	let click_count = Rc::new(Cell::new(0));
	let callback: Handler = Rc::new({
		let click_count = click_count.clone();
		move |event: &dyn Any| {
			event.downcast_ref::<web_sys::Event>().expect("Expected Event but received something else.");
			click_count.set(click_count.get() + 1);
		}
	});

	let vdom = Element::tag("button").prop("id", "test-button").prop("onClick", callback.clone()).build();

	assert_eq!(click_count.get(), 0);
	renderer.render_tree(vdom, &container).unwrap();
	assert_eq!(click_count.get(), 0);

	let button: HtmlElement = window().unwrap().document().unwrap().get_element_by_id("test-button").unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(click_count.get(), 1);

	// Same handler on another element shares the listener.
	let vdom = Element::tag("button")
		.prop("id", "test-button")
		.prop("onClick", callback.clone())
		.child(Element::tag("span").prop("onClickCapture", callback).build())
		.build();
	renderer.render_tree(vdom, &container).unwrap();
	assert_eq!(renderer.target().listener_count(), 1);
	button.click();
	assert_eq!(click_count.get(), 2);

	renderer.unmount_tree(&container);
	button.click();
	assert_eq!(click_count.get(), 2);
	assert_eq!(renderer.target().listener_count(), 0);
}
