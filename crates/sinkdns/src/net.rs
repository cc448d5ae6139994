// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket-binding helpers.
//!
//! The server consumes already-bound, non-blocking sockets (already
//! listening, for TCP) and autodetects the transport from the socket type.
//! These helpers produce such sockets for the common cases; anything bound
//! elsewhere works just as well as long as it honors the same contract.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::{AsFd, OwnedFd};

use log::info;
use socket2::{Domain, Protocol, SockRef, Socket, Type};

use crate::config::DEFAULT_TCP_BACKLOG;

fn bind_socket(addr: SocketAddr, ty: Type, backlog: Option<i32>) -> io::Result<OwnedFd> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let protocol = if ty == Type::STREAM {
        Protocol::TCP
    } else {
        Protocol::UDP
    };

    let socket = Socket::new(domain, ty, Some(protocol))?;
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        // Keep v4 and v6 ports independently bindable.
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    if let Some(backlog) = backlog {
        socket.listen(backlog)?;
    }
    socket.set_nonblocking(true)?;

    let kind = if ty == Type::STREAM { "tcp" } else { "udp" };
    let bound = socket
        .local_addr()
        .ok()
        .and_then(|a| a.as_socket())
        .unwrap_or(addr);
    info!("[net] bound {kind} socket to {bound}");

    Ok(socket.into())
}

/// Bind a non-blocking UDP socket to `addr`.
pub fn bind_udp(addr: SocketAddr) -> io::Result<OwnedFd> {
    bind_socket(addr, Type::DGRAM, None)
}

/// Bind a non-blocking, listening TCP socket to `addr`.
pub fn bind_tcp(addr: SocketAddr, backlog: i32) -> io::Result<OwnedFd> {
    bind_socket(addr, Type::STREAM, Some(backlog))
}

/// Bind UDP on all IPv4 interfaces.
pub fn bind_udp4_port(port: u16) -> io::Result<OwnedFd> {
    bind_udp(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
}

/// Bind UDP on all IPv6 interfaces (v6-only).
pub fn bind_udp6_port(port: u16) -> io::Result<OwnedFd> {
    bind_udp(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)))
}

/// Bind a TCP listener on all IPv4 interfaces.
pub fn bind_tcp4_port(port: u16) -> io::Result<OwnedFd> {
    bind_tcp(
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        DEFAULT_TCP_BACKLOG,
    )
}

/// Bind a TCP listener on all IPv6 interfaces (v6-only).
pub fn bind_tcp6_port(port: u16) -> io::Result<OwnedFd> {
    bind_tcp(
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
        DEFAULT_TCP_BACKLOG,
    )
}

/// Whether the socket behind `fd` is a stream (TCP) socket.
pub(crate) fn socket_is_stream(fd: &impl AsFd) -> io::Result<bool> {
    Ok(SockRef::from(fd).r#type()? == Type::STREAM)
}

/// Local address of a bound socket. Handy after binding port 0.
pub fn local_addr(fd: &impl AsFd) -> io::Result<SocketAddr> {
    SockRef::from(fd).local_addr()?.as_socket().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "socket has no inet address")
    })
}
