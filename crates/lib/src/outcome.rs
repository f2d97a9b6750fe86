//! Result discipline shared by every pipeline stage.
//!
//! Every fallible operation returns a `Result` whose error is a closed enum
//! owned by that stage. The [`Either`] extension trait adds the combinators
//! the pipeline composes with: the success branch is the "right" value, the
//! error branch the "left" one.
//!
//! Runs accumulate human-readable progress lines ("items"). A successful run
//! yields them inside [`Success`]; a failed run carries them inside its error,
//! exposed through the [`Items`] trait, so both branches render the same way.

use std::future::Future;

/// Types that carry the progress lines accumulated before they were produced.
pub trait Items {
  fn items(&self) -> &[String];
}

/// Unit success marker plus the ordered progress items of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Success {
  pub items: Vec<String>,
}

impl Success {
  pub fn new(items: Vec<String>) -> Self {
    Self { items }
  }
}

impl Items for Success {
  fn items(&self) -> &[String] {
    &self.items
  }
}

/// Combinators over `Result<R, L>` viewed as a two-branch value.
///
/// No combinator ever calls a right-branch closure once the value is known to
/// be a left.
pub trait Either<R, L>: Sized {
  /// Transform the success branch.
  fn map_right<U>(self, f: impl FnOnce(R) -> U) -> Result<U, L>;

  /// Transform the error branch.
  fn map_left<M>(self, f: impl FnOnce(L) -> M) -> Result<R, M>;

  /// Fold the error branch into the success type.
  fn handle(self, on_left: impl FnOnce(L) -> R) -> R;

  /// Fold both branches into one value.
  fn fold<T>(self, on_left: impl FnOnce(L) -> T, on_right: impl FnOnce(R) -> T) -> T;

  /// Await a producer on the success branch only.
  fn then_async<U, F, Fut>(self, f: F) -> impl Future<Output = Result<U, L>>
  where
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<U, L>>;
}

impl<R, L> Either<R, L> for Result<R, L> {
  fn map_right<U>(self, f: impl FnOnce(R) -> U) -> Result<U, L> {
    self.map(f)
  }

  fn map_left<M>(self, f: impl FnOnce(L) -> M) -> Result<R, M> {
    self.map_err(f)
  }

  fn handle(self, on_left: impl FnOnce(L) -> R) -> R {
    match self {
      Ok(right) => right,
      Err(left) => on_left(left),
    }
  }

  fn fold<T>(self, on_left: impl FnOnce(L) -> T, on_right: impl FnOnce(R) -> T) -> T {
    match self {
      Ok(right) => on_right(right),
      Err(left) => on_left(left),
    }
  }

  fn then_async<U, F, Fut>(self, f: F) -> impl Future<Output = Result<U, L>>
  where
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<U, L>>,
  {
    async move {
      match self {
        Ok(right) => f(right).await,
        Err(left) => Err(left),
      }
    }
  }
}

/// Await `producer`, then fold whichever branch it yields.
pub async fn fold_async<R, L, T>(
  producer: impl Future<Output = Result<R, L>>,
  on_left: impl FnOnce(L) -> T,
  on_right: impl FnOnce(R) -> T,
) -> T {
  producer.await.fold(on_left, on_right)
}

/// Render a run outcome as its items followed by a terminal line.
pub fn render<E>(outcome: &Result<Success, E>, success_marker: &str) -> Vec<String>
where
  E: Items + std::fmt::Display,
{
  match outcome {
    Ok(success) => {
      let mut lines = success.items.clone();
      lines.push(success_marker.to_string());
      lines
    }
    Err(error) => {
      let mut lines = error.items().to_vec();
      lines.push(error.to_string());
      lines
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug)]
  struct Failure {
    items: Vec<String>,
  }

  impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "boom")
    }
  }

  impl Items for Failure {
    fn items(&self) -> &[String] {
      &self.items
    }
  }

  #[test]
  fn map_right_skips_left() {
    let value: Result<i32, &str> = Err("bad");
    let mut called = false;
    let mapped = value.map_right(|v| {
      called = true;
      v + 1
    });
    assert_eq!(mapped, Err("bad"));
    assert!(!called);
  }

  #[test]
  fn handle_folds_left_into_right() {
    let ok: Result<Vec<String>, Failure> = Ok(vec!["fine".to_string()]);
    let err: Result<Vec<String>, Failure> = Err(Failure {
      items: vec!["partial".to_string()],
    });
    assert_eq!(ok.handle(|f| f.items), vec!["fine"]);
    assert_eq!(err.handle(|f| f.items), vec!["partial"]);
  }

  #[test]
  fn fold_reaches_both_branches() {
    let ok: Result<u8, u8> = Ok(2);
    let err: Result<u8, u8> = Err(3);
    assert_eq!(ok.fold(|l| format!("L{l}"), |r| format!("R{r}")), "R2");
    assert_eq!(err.fold(|l| format!("L{l}"), |r| format!("R{r}")), "L3");
  }

  #[tokio::test]
  async fn then_async_awaits_only_on_right() {
    let ok: Result<u32, String> = Ok(20);
    let chained = ok.then_async(|v| async move { Ok::<_, String>(v * 2) }).await;
    assert_eq!(chained, Ok(40));

    let mut called = false;
    let err: Result<u32, String> = Err("stop".to_string());
    let chained = err
      .then_async(|_| {
        called = true;
        async { Ok::<u32, String>(0) }
      })
      .await;
    assert_eq!(chained, Err("stop".to_string()));
    assert!(!called);
  }

  #[tokio::test]
  async fn fold_async_awaits_producer_first() {
    let rendered = fold_async(async { Err::<u8, _>("nope") }, |l| l.len(), |r| r as usize).await;
    assert_eq!(rendered, 4);
  }

  #[test]
  fn render_appends_terminal_line() {
    let ok: Result<Success, Failure> = Ok(Success::new(vec!["flashed".to_string()]));
    assert_eq!(render(&ok, "done"), vec!["flashed", "done"]);

    let err: Result<Success, Failure> = Err(Failure {
      items: vec!["flashed".to_string()],
    });
    assert_eq!(render(&err, "done"), vec!["flashed", "boom"]);
  }
}
