//! Command handlers
//!
//! Each handler turns one validated request into a response with at most
//! one mutating store call. Conflicts such as a missing key are ordinary
//! response statuses, not errors.

use bytes::Bytes;

use crate::protocol::{Extras, Response, Status};
use crate::store::{Delta, Expiry, PutMode, PutOutcome, Record, StoreResult};
use super::Context;

pub(super) fn get(ctx: &Context<'_>) -> StoreResult<Response> {
    let request = ctx.request;

    Ok(match ctx.store.get(&request.key)? {
        Some(record) => Response::ok(request)
            .with_extras(record.flags.to_be_bytes().to_vec())
            .with_value(record.payload.to_bytes()),
        None => Response::to(request, Status::KeyNotFound),
    })
}

pub(super) fn set(ctx: &Context<'_>) -> StoreResult<Response> {
    store_value(ctx, PutMode::Always)
}

pub(super) fn add(ctx: &Context<'_>) -> StoreResult<Response> {
    store_value(ctx, PutMode::IfAbsent)
}

pub(super) fn replace(ctx: &Context<'_>) -> StoreResult<Response> {
    store_value(ctx, PutMode::IfPresent)
}

fn store_value(ctx: &Context<'_>, mode: PutMode) -> StoreResult<Response> {
    let request = ctx.request;
    let Extras::Store(extras) = ctx.extras else {
        return Ok(Response::to(request, Status::InvalidArguments));
    };

    let record = Record::bytes(
        extras.flags,
        Expiry::from_wire(extras.expiry, ctx.now),
        request.value.clone(),
    );

    let status = match ctx.store.put(request.key.clone(), record, mode)? {
        PutOutcome::Stored => Status::Success,
        PutOutcome::Exists => Status::KeyExists,
        PutOutcome::NotFound => Status::KeyNotFound,
    };
    Ok(Response::to(request, status))
}

pub(super) fn delete(ctx: &Context<'_>) -> StoreResult<Response> {
    let request = ctx.request;

    let status = if ctx.store.delete(&request.key)? {
        Status::Success
    } else {
        Status::KeyNotFound
    };
    Ok(Response::to(request, status))
}

pub(super) fn increment(ctx: &Context<'_>) -> StoreResult<Response> {
    adjust_counter(ctx, Delta::Increment)
}

pub(super) fn decrement(ctx: &Context<'_>) -> StoreResult<Response> {
    adjust_counter(ctx, Delta::Decrement)
}

fn adjust_counter(ctx: &Context<'_>, direction: fn(u64) -> Delta) -> StoreResult<Response> {
    let request = ctx.request;
    let Extras::Counter(extras) = ctx.extras else {
        return Ok(Response::to(request, Status::InvalidArguments));
    };

    let outcome = ctx.store.compare_and_swap_numeric(
        request.key.clone(),
        direction(extras.delta),
        extras.initial,
        Expiry::from_wire(extras.expiry, ctx.now),
    )?;

    Ok(match outcome.value() {
        Some(value) => Response::ok(request).with_value(value.to_be_bytes().to_vec()),
        None => Response::to(request, Status::NonNumeric),
    })
}

pub(super) fn version(ctx: &Context<'_>) -> StoreResult<Response> {
    Ok(Response::ok(ctx.request).with_value(Bytes::copy_from_slice(ctx.version.as_bytes())))
}
