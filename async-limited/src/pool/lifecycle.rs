use futures_core::future::BoxFuture;

pub(crate) type CreateFn<T, E, S> = Box<dyn Fn(usize, S) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

pub(crate) type DestructFn<T, E> = Box<dyn Fn(T, usize) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;

pub(crate) type HookFn<T, E> =
    Box<dyn for<'a> Fn(&'a mut T, usize) -> BoxFuture<'a, Result<(), E>> + Send + Sync>;

pub(crate) type InitFn<S, E> = Box<dyn Fn() -> BoxFuture<'static, Result<S, E>> + Send + Sync>;

pub(crate) type IdleFn<S, E> = Box<dyn Fn(S) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;

pub(crate) type GetterFn<T, K> = Box<dyn for<'a> Fn(&'a T) -> &'a K + Send + Sync>;

/// The set of caller-supplied callbacks. Every hook except `create` and
/// `on_init` is optional and behaves as a no-op when absent.
pub(crate) struct Lifecycle<T, E, S, K: ?Sized> {
    pub create: CreateFn<T, E, S>,
    pub destruct: Option<DestructFn<T, E>>,
    pub getter: GetterFn<T, K>,
    pub on_acquire: Option<HookFn<T, E>>,
    pub on_free: Option<HookFn<T, E>>,
    pub on_idle: Option<IdleFn<S, E>>,
    pub on_init: InitFn<S, E>,
}

impl<T, E, S, K: ?Sized> Lifecycle<T, E, S, K> {
    pub fn create(&self, id: usize, shared: S) -> BoxFuture<'static, Result<T, E>> {
        (self.create)(id, shared)
    }

    pub async fn destruct(&self, res: T, id: usize) -> Result<(), E> {
        match self.destruct.as_ref() {
            Some(handler) => handler(res, id).await,
            None => Ok(()),
        }
    }

    pub async fn acquire(&self, res: &mut T, id: usize) -> Result<(), E> {
        match self.on_acquire.as_ref() {
            Some(handler) => handler(res, id).await,
            None => Ok(()),
        }
    }

    pub async fn free(&self, res: &mut T, id: usize) -> Result<(), E> {
        match self.on_free.as_ref() {
            Some(handler) => handler(res, id).await,
            None => Ok(()),
        }
    }

    pub fn init(&self) -> BoxFuture<'static, Result<S, E>> {
        (self.on_init)()
    }

    pub async fn idle(&self, shared: S) -> Result<(), E> {
        match self.on_idle.as_ref() {
            Some(handler) => handler(shared).await,
            None => Ok(()),
        }
    }

    pub fn get<'a>(&self, res: &'a T) -> &'a K {
        (self.getter)(res)
    }

    pub fn with_getter<K2: ?Sized>(self, getter: GetterFn<T, K2>) -> Lifecycle<T, E, S, K2> {
        Lifecycle {
            create: self.create,
            destruct: self.destruct,
            getter,
            on_acquire: self.on_acquire,
            on_free: self.on_free,
            on_idle: self.on_idle,
            on_init: self.on_init,
        }
    }
}
