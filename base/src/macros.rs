#[macro_export]
/// Shortcut for aborting a joinhandle and then awaiting and discarding its result.
macro_rules! cancel_task {
    ($task:ident) => {
        #[allow(unused_must_use)]
        {
            let t = $task.into_inner();
            t.abort();
            t.await;
        }
    };
}
