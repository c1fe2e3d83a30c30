#![forbid(unsafe_code)]

//! Re-execution driven by an observable parameter source.

use fetchstate_reactive::{Subscription, WatchOptions};

use crate::controller::RequestController;

/// Watch the controller's parameter source and execute on every change.
///
/// Returns `None` when the source is a literal or a supplier. The watcher
/// holds the controller weakly; the returned guard is meant to be stored on
/// the controller itself. Shallow watching (`deep == false`) ignores nested
/// mutations of the parameter value.
pub(crate) fn watch_source<CP, R, D>(
    controller: &RequestController<CP, R, D>,
    deep: bool,
) -> Option<Subscription>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    let observable = controller.source().as_observable()?;
    let weak = controller.downgrade();
    let options = WatchOptions {
        deep,
        immediate: false,
    };
    Some(observable.watch(options, move |_| {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        tracing::trace!(message = "request.trigger", controller_id = controller.id());
        let _ = controller.execute();
    }))
}
