//! Neighbor exchanges of variable-size record lists.
//!
//! Stage 1 exchanges the number of records each neighbor will send; stage 2
//! ships the records and checks them against the announced counts. Both
//! stages post every receive before any send, and drain every handle before
//! returning, even if an error occurs.

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{cast_slice, decode_records, expect_exact_len, WireCount};
use crate::bipart_error::BipartError;

/// Exchange record counts with each neighbor rank.
///
/// `counts[i]` is sent to `neighbors[i]`; the result holds, in the same
/// order, the count announced by each neighbor.
pub fn exchange_sizes<C: Communicator>(
    comm: &C,
    tag: CommTag,
    neighbors: &[usize],
    counts: &[usize],
) -> Result<Vec<usize>, BipartError> {
    // 1) post all receives
    let recvs: Vec<C::RecvHandle> = neighbors
        .iter()
        .map(|&nbr| comm.irecv(nbr, tag.as_u16()))
        .collect();

    // 2) post all sends
    let pending_sends: Vec<C::SendHandle> = neighbors
        .iter()
        .zip(counts)
        .map(|(&nbr, &n)| comm.isend(nbr, tag.as_u16(), cast_slice(&[WireCount::new(n)])))
        .collect();

    // 3) wait for all recvs, collect counts (but do not early-return)
    let mut sizes_in = vec![0; neighbors.len()];
    let mut maybe_err = None;
    for (i, (h, &nbr)) in recvs.into_iter().zip(neighbors).enumerate() {
        match h.wait() {
            Some(data) if maybe_err.is_none() => {
                match expect_exact_len(data.len(), std::mem::size_of::<WireCount>())
                    .and_then(|()| decode_records::<WireCount>(&data))
                {
                    Ok(cnt) => sizes_in[i] = cnt[0].get(),
                    Err(e) => maybe_err = Some(BipartError::comm(nbr, format!("size header: {e}"))),
                }
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(BipartError::comm(nbr, format!("failed to receive size from rank {nbr}")));
            }
            _ => {} // already have an error; just drain
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Ship `outgoing[i]` to `neighbors[i]` and receive one list from each.
///
/// When `expected` is given, each received list must hold exactly the
/// announced number of records.
pub fn exchange_records<C: Communicator, T: Pod>(
    comm: &C,
    tag: CommTag,
    neighbors: &[usize],
    outgoing: &[Vec<T>],
    expected: Option<&[usize]>,
) -> Result<Vec<Vec<T>>, BipartError> {
    let recvs: Vec<C::RecvHandle> = neighbors
        .iter()
        .map(|&nbr| comm.irecv(nbr, tag.as_u16()))
        .collect();
    let pending_sends: Vec<C::SendHandle> = neighbors
        .iter()
        .zip(outgoing)
        .map(|(&nbr, recs)| comm.isend(nbr, tag.as_u16(), cast_slice(recs)))
        .collect();

    let mut incoming = Vec::with_capacity(neighbors.len());
    let mut maybe_err = None;
    for (i, (h, &nbr)) in recvs.into_iter().zip(neighbors).enumerate() {
        let got = h
            .wait()
            .ok_or_else(|| BipartError::comm(nbr, format!("failed to receive records from rank {nbr}")))
            .and_then(|data| decode_records::<T>(&data).map_err(|e| BipartError::comm(nbr, e)))
            .and_then(|recs| match expected {
                Some(exp) if exp[i] != recs.len() => Err(BipartError::comm(
                    nbr,
                    format!("announced {} records, received {}", exp[i], recs.len()),
                )),
                _ => Ok(recs),
            });
        match got {
            Ok(recs) => incoming.push(recs),
            Err(e) => {
                incoming.push(Vec::new());
                maybe_err.get_or_insert(e);
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(incoming),
    }
}
