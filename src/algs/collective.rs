//! Collective operations built on point-to-point messages.
//!
//! Every rank sends its contribution to every other rank. All receives are
//! completed and all sends drained before an error is returned.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{cast_slice, decode_records, WireGnum};
use crate::bipart_error::BipartError;
use crate::Gnum;

/// Gather one value from every rank, in rank order.
pub fn allgather<C: Communicator>(comm: &C, tag: CommTag, value: Gnum) -> Result<Vec<Gnum>, BipartError> {
    let rank = comm.rank();
    let size = comm.size();
    if size <= 1 {
        return Ok(vec![value]);
    }

    // 1) post all receives
    let recvs: Vec<(usize, C::RecvHandle)> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| (p, comm.irecv(p, tag.as_u16())))
        .collect();

    // 2) post all sends
    let wire = [WireGnum::of(value)];
    let sends: Vec<C::SendHandle> = (0..size)
        .filter(|&p| p != rank)
        .map(|p| comm.isend(p, tag.as_u16(), cast_slice(&wire)))
        .collect();

    // 3) wait for all receives, keeping only the first error
    let mut out = vec![0; size];
    out[rank] = value;
    let mut maybe_err = None;
    for (peer, h) in recvs {
        let got = h
            .wait()
            .ok_or_else(|| BipartError::comm(peer, "collective receive failed"))
            .and_then(|data| {
                let recs = decode_records::<WireGnum>(&data).map_err(|e| BipartError::comm(peer, e))?;
                match recs.as_slice() {
                    [v] => Ok(v.get()),
                    _ => Err(BipartError::comm(peer, format!("expected 1 value, got {}", recs.len()))),
                }
            });
        match got {
            Ok(v) => out[peer] = v,
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }

    // 4) always drain all send handles
    for s in sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

/// Sum of `value` over all ranks.
pub fn allreduce_sum<C: Communicator>(comm: &C, tag: CommTag, value: Gnum) -> Result<Gnum, BipartError> {
    Ok(allgather(comm, tag, value)?.into_iter().sum())
}

/// Maximum of `value` over all ranks.
pub fn allreduce_max<C: Communicator>(comm: &C, tag: CommTag, value: Gnum) -> Result<Gnum, BipartError> {
    Ok(allgather(comm, tag, value)?.into_iter().max().unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, ThreadComm};

    #[test]
    fn single_rank_is_identity() {
        let tag = CommTag::new(1);
        assert_eq!(allgather(&NoComm, tag, 7).unwrap(), vec![7]);
        assert_eq!(allreduce_sum(&NoComm, tag, 7).unwrap(), 7);
    }

    #[test]
    fn threads_gather_in_rank_order() {
        let world = ThreadComm::world(4);
        let tag = CommTag::new(2);
        let results: Vec<_> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let v = 10 * c.rank() as Gnum;
                        let all = allgather(c, tag, v).unwrap();
                        let sum = allreduce_sum(c, tag, v).unwrap();
                        let max = allreduce_max(c, tag, v).unwrap();
                        (all, sum, max)
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (all, sum, max) in results {
            assert_eq!(all, vec![0, 10, 20, 30]);
            assert_eq!(sum, 60);
            assert_eq!(max, 30);
        }
    }
}
