#[macro_export(local_inner_macros)]
macro_rules! replace_with_single_token {
  ($($x:tt)*) => {
    ()
  };
}

#[macro_export(local_inner_macros)]
macro_rules! count_exprs {
  ($($rest:expr),*) => {
    <[()]>::len(&[$(replace_with_single_token!($rest)),*])
  };
}

/// Same as the `hashmap!` macro from `maplit`, but keeps the insertion order
/// by building an [`indexmap::IndexMap`].
#[macro_export(local_inner_macros)]
macro_rules! indexmap {
  ($($key:expr => $value:expr,)+) => { indexmap!($($key => $value),+) };
  ($($key:expr => $value:expr),*) => {
    {
      let _cap = count_exprs!($($key),*);
      let mut _map = ::indexmap::IndexMap::with_capacity(_cap);
      $(let _ = _map.insert($key, $value);)*
      _map
    }
  };
}

#[macro_export]
macro_rules! assert_trait_is_object_safe {
  ($($trait:tt)+) => {
    const _: Option<&dyn $($trait)+> = None;
  };
}
