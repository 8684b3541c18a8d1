#![cfg(target_arch = "wasm32")]

use sapling_dom::dom::DomTarget;
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlBodyElement, Node};

static mut LOG_INITIALIZED: bool = false;

/// A target for the test document and a fresh, empty container appended to its body.
pub fn container() -> (DomTarget, Node) {
	unsafe {
		if !LOG_INITIALIZED {
			// TODO: Fail tests that log warnings or errors.
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let document = window().unwrap().document().unwrap();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let container: Node = document.create_element("div").unwrap().into();
	body.append_child(&container).unwrap();
	(DomTarget::new(document), container)
}

pub fn inner_html(container: &Node) -> String {
	container.dyn_ref::<web_sys::Element>().unwrap().inner_html()
}
