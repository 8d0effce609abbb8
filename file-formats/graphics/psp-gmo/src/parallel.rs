//! Running independent import stages side by side

/// Run three independent closures and return all results
///
/// With the `parallel` feature the closures run on the rayon pool,
/// otherwise one after another in argument order.
#[cfg(feature = "parallel")]
pub fn join3<A, B, C, RA, RB, RC>(a: A, b: B, c: C) -> (RA, RB, RC)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    C: FnOnce() -> RC + Send,
    RA: Send,
    RB: Send,
    RC: Send,
{
    let (ra, (rb, rc)) = rayon::join(a, || rayon::join(b, c));
    (ra, rb, rc)
}

/// Run three independent closures and return all results
#[cfg(not(feature = "parallel"))]
pub fn join3<A, B, C, RA, RB, RC>(a: A, b: B, c: C) -> (RA, RB, RC)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
    C: FnOnce() -> RC,
{
    (a(), b(), c())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join3_keeps_positions() {
        let data = vec![1, 2, 3];
        let (sum, len, first) = join3(
            || data.iter().sum::<i32>(),
            || data.len(),
            || data.first().copied(),
        );
        assert_eq!(sum, 6);
        assert_eq!(len, 3);
        assert_eq!(first, Some(1));
    }
}
