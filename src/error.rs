use crate::suspense::PendingValue;
use core::fmt::{self, Debug, Display, Formatter};
use std::{borrow::Cow, error::Error, rc::Rc};

/// A failure raised while rendering, or the suspension signal.
#[derive(Clone)]
pub enum RenderError {
	/// An arbitrary error raised by component code.
	Failed(Rc<dyn Error>),
	Message(Cow<'static, str>),
	/// The component waits on a [`PendingValue`]. Handled by the nearest suspense boundary.
	Pending(PendingValue),
}
impl RenderError {
	pub fn msg(message: impl Into<Cow<'static, str>>) -> Self {
		Self::Message(message.into())
	}

	pub fn new(error: impl Error + 'static) -> Self {
		Self::Failed(Rc::new(error))
	}

	/// The pending value if this is a suspension signal.
	#[must_use]
	pub fn pending_value(&self) -> Option<&PendingValue> {
		match self {
			RenderError::Pending(pending) => Some(pending),
			_ => None,
		}
	}
}
impl Display for RenderError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			RenderError::Failed(error) => Display::fmt(error, f),
			RenderError::Message(message) => f.write_str(message),
			RenderError::Pending(_) => f.write_str("render suspended on a pending value that no boundary handled"),
		}
	}
}
impl Debug for RenderError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			RenderError::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
			RenderError::Message(message) => f.debug_tuple("Message").field(message).finish(),
			RenderError::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
		}
	}
}
impl Error for RenderError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			RenderError::Failed(error) => Some(&**error),
			_ => None,
		}
	}
}
impl From<PendingValue> for RenderError {
	fn from(pending: PendingValue) -> Self {
		Self::Pending(pending)
	}
}
